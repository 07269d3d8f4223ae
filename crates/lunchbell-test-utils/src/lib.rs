//! Scripted stand-ins for the external systems a workflow talks to.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;

use lunchbell_core::config::ModelConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::{Clock, ContentSource, DeliverySink, LlmClient};

/// Replies handed out in order; the last one repeats forever.
#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<std::result::Result<String, String>>,
    last: Option<std::result::Result<String, String>>,
}

impl Script {
    fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: replies.into(),
            last: None,
        }
    }

    fn next(&mut self) -> std::result::Result<String, String> {
        if let Some(reply) = self.replies.pop_front() {
            self.last = Some(reply.clone());
            return reply;
        }
        self.last
            .clone()
            .unwrap_or_else(|| Err("script exhausted".to_string()))
    }
}

#[derive(Debug, Default)]
struct SourceState {
    script: Script,
    locators: Vec<String>,
    stalled: bool,
}

/// Content source that returns scripted pages.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                script: Script::new(replies),
                ..Default::default()
            })),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(message.to_string())])
    }

    /// A source whose fetch never completes.
    pub fn stalled() -> Self {
        let source = Self::new(Vec::new());
        source.state.lock().unwrap().stalled = true;
        source
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().locators.len()
    }

    pub fn locators(&self) -> Vec<String> {
        self.state.lock().unwrap().locators.clone()
    }
}

impl ContentSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let (reply, stalled) = {
                let mut state = self.state.lock().unwrap();
                state.locators.push(locator.to_string());
                (state.script.next(), state.stalled)
            };
            if stalled {
                futures::future::pending::<()>().await;
            }
            reply.map_err(LunchbellError::Source)
        })
    }
}

#[derive(Debug, Default)]
struct LlmState {
    script: Script,
    prompts: Vec<String>,
}

/// LLM client that returns scripted completions and records prompts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLlm {
    state: Arc<Mutex<LlmState>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LlmState {
                script: Script::new(replies),
                prompts: Vec::new(),
            })),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(message.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().prompts.len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete<'a>(
        &'a self,
        _config: &'a ModelConfig,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.prompts.push(prompt.to_string());
            state.script.next().map_err(LunchbellError::LlmRequest)
        })
    }
}

/// A message handed to a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub text: String,
    pub destination: String,
}

#[derive(Debug, Default)]
struct SinkState {
    sent: Vec<SentMessage>,
    accept: VecDeque<bool>,
    default_accept: bool,
}

/// Delivery sink that records every message it is handed.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    /// Accepts everything.
    pub fn new() -> Self {
        Self::with_acceptance(Vec::new(), true)
    }

    /// Records but rejects everything.
    pub fn rejecting() -> Self {
        Self::with_acceptance(Vec::new(), false)
    }

    /// Answers from `accept` in order, then `default_accept`.
    pub fn with_acceptance(accept: Vec<bool>, default_accept: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                sent: Vec::new(),
                accept: accept.into(),
                default_accept,
            })),
        }
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn messages_to(&self, destination: &str) -> Vec<SentMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.destination == destination)
            .collect()
    }
}

impl DeliverySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver<'a>(&'a self, message: &'a str, destination: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.sent.push(SentMessage {
                text: message.to_string(),
                destination: destination.to_string(),
            });
            let default = state.default_accept;
            state.accept.pop_front().unwrap_or(default)
        })
    }
}

/// Clock frozen at one instant. Defaults to 2024-03-04 02:00 UTC.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
