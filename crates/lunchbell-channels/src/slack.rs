use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::config::{is_secret_set, SlackConfig};
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::DeliverySink;

use crate::util::{split_message, SLACK_TEXT_LIMIT};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Posts messages through the Slack Web API with a bot token.
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: Option<String>,
    api_base: String,
    /// Chunks already accepted by Slack, keyed by (channel, full text), for
    /// messages whose later chunks failed.
    posted: Mutex<HashMap<(String, String), usize>>,
}

impl SlackClient {
    pub fn new(bot_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.filter(|t| is_secret_set(Some(t.as_str()))),
            api_base: SLACK_API_BASE.to_string(),
            posted: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Self {
        Self::new(config.bot_token.clone())
    }

    /// Point at a different API root (e.g. a Slack-compatible proxy).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_token(&self) -> bool {
        self.bot_token.is_some()
    }

    /// Post `text` to `channel`, split into as many messages as Slack needs.
    ///
    /// If a chunk fails, a later call with the same channel and text resumes
    /// after the chunks that already went out instead of posting them again.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let bot_token = self.bot_token.as_deref().ok_or_else(|| LunchbellError::Channel {
            channel: "slack".into(),
            message: "bot token is not configured (set SLACK_BOT_TOKEN)".into(),
        })?;

        self.post_chunks(channel, text, |chunk| {
            Box::pin(async move { self.post_chunk(bot_token, channel, &chunk).await })
        })
        .await?;
        info!(channel, "Slack message posted");
        Ok(())
    }

    async fn post_chunks<'a, F>(&self, channel: &str, text: &str, mut post: F) -> Result<()>
    where
        F: FnMut(String) -> BoxFuture<'a, Result<()>>,
    {
        let key = (channel.to_string(), text.to_string());
        let chunks = split_message(text, SLACK_TEXT_LIMIT);
        let done = self.progress(|posted| posted.get(&key).copied().unwrap_or(0))?;
        if done > 0 {
            info!(
                channel,
                skipped = done,
                total = chunks.len(),
                "Resuming partially posted message"
            );
        }

        for (i, chunk) in chunks.into_iter().enumerate().skip(done) {
            post(chunk).await?;
            self.progress(|posted| posted.insert(key.clone(), i + 1))?;
        }
        self.progress(|posted| posted.remove(&key))?;
        Ok(())
    }

    fn progress<T>(
        &self,
        f: impl FnOnce(&mut HashMap<(String, String), usize>) -> T,
    ) -> Result<T> {
        let mut posted = self.posted.lock().map_err(|e| LunchbellError::Channel {
            channel: "slack".into(),
            message: e.to_string(),
        })?;
        Ok(f(&mut posted))
    }

    async fn post_chunk(&self, bot_token: &str, channel: &str, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(bot_token)
            .json(&serde_json::json!({
                "channel": channel,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| LunchbellError::Channel {
                channel: "slack".into(),
                message: format!("chat.postMessage failed: {e}"),
            })?;

        let body: serde_json::Value = resp.json().await.map_err(|e| LunchbellError::Channel {
            channel: "slack".into(),
            message: format!("Invalid postMessage response: {e}"),
        })?;

        if !body["ok"].as_bool().unwrap_or(false) {
            return Err(LunchbellError::Channel {
                channel: "slack".into(),
                message: format!(
                    "chat.postMessage error: {}",
                    body["error"].as_str().unwrap_or("unknown")
                ),
            });
        }

        Ok(())
    }
}

impl DeliverySink for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    fn deliver<'a>(&'a self, message: &'a str, destination: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.post_message(destination, message).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(channel = %destination, error = %e, "Slack delivery failed");
                    false
                }
            }
        })
    }
}
