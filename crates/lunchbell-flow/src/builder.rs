//! Graph builders for the shipped workflows. Each call returns a fresh
//! [`Flow`] with its own node instances.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;

use lunchbell_core::config::{AppConfig, ModelConfig};
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::{Clock, ContentSource, DeliverySink, LlmClient};
use lunchbell_core::types::{Action, Stage};

use crate::gate::{DebugCheckNode, GatePolicy, Proceed};
use crate::graph::{Flow, RetryPolicy};
use crate::message::LocalClock;
use crate::nodes::{
    FetchMenuNode, HolidayNoticeNode, SendSlackNode, SituationDetectorNode, SpecialMenuNode,
    SummarizeMenuNode,
};

/// External systems and tuning every node graph is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ContentSource>,
    pub llm: Arc<dyn LlmClient>,
    pub model: ModelConfig,
    pub sink: Arc<dyn DeliverySink>,
    pub clock: Arc<dyn Clock>,
    pub utc_offset: FixedOffset,
    pub debug_channel: String,
    pub error_threshold: usize,
}

impl Collaborators {
    /// Wire collaborators with the model, offset, debug channel and error
    /// threshold taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn ContentSource>,
        llm: Arc<dyn LlmClient>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            source,
            llm,
            model: config.model.clone(),
            sink,
            clock,
            utc_offset: utc_offset(config.schedule.utc_offset_hours)?,
            debug_channel: config.slack.debug_channel.clone(),
            error_threshold: config.flow.error_threshold,
        })
    }

    fn local_clock(&self) -> LocalClock {
        LocalClock::new(self.clock.clone(), self.utc_offset)
    }

    fn gate(&self, name: &str, stage: Stage, proceed: Proceed) -> DebugCheckNode {
        DebugCheckNode::new(
            name,
            [stage],
            proceed,
            GatePolicy {
                error_threshold: self.error_threshold,
                debug_channel: self.debug_channel.clone(),
                sink: self.sink.clone(),
                clock: self.local_clock(),
            },
        )
    }

    fn fetch(&self) -> FetchMenuNode {
        FetchMenuNode::new(self.source.clone(), self.clock.clone())
    }

    fn detector(&self) -> SituationDetectorNode {
        SituationDetectorNode::new(self.llm.clone(), self.model.clone())
    }

    fn summarizer(&self) -> SummarizeMenuNode {
        SummarizeMenuNode::new(self.llm.clone(), self.model.clone())
    }

    fn sender(&self) -> SendSlackNode {
        SendSlackNode::new(self.sink.clone(), self.local_clock())
    }

    fn holiday(&self) -> HolidayNoticeNode {
        HolidayNoticeNode::new(self.sink.clone(), self.local_clock())
    }

    fn special(&self) -> SpecialMenuNode {
        SpecialMenuNode::new(self.sink.clone(), self.local_clock())
    }
}

pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| LunchbellError::Config(format!("invalid UTC offset: {hours}h")))
}

/// The production workflow with a gate after every stage.
///
/// ```text
/// fetch -> debug_fetch      success: detect   retry: fetch      fail: send
/// detect -> debug_situation normal: summarize holiday_notice: holiday
///                           special_notice: special  error_notice: send
///                           retry: detect     fail: send
/// holiday, special          end
/// summarize -> debug_summarize  success: send  retry: summarize  fail: send
/// send -> debug_send        success: end      retry: send       fail: end
/// ```
pub fn menu_notification_flow(c: &Collaborators) -> Result<Flow> {
    let mut b = Flow::builder();

    let fetch = b.add(c.fetch(), RetryPolicy::with_wait_secs(3, 5));
    let detect = b.add(c.detector(), RetryPolicy::with_wait_secs(2, 3));
    let holiday = b.add(c.holiday(), RetryPolicy::with_wait_secs(2, 2));
    let special = b.add(c.special(), RetryPolicy::with_wait_secs(2, 2));
    let summarize = b.add(c.summarizer(), RetryPolicy::with_wait_secs(2, 3));
    let send = b.add(c.sender(), RetryPolicy::with_wait_secs(2, 2));

    let debug_fetch = b.add(
        c.gate("debug_fetch", Stage::Fetch, Proceed::Success),
        RetryPolicy::once(),
    );
    let debug_situation = b.add(
        c.gate("debug_situation", Stage::Detect, Proceed::Situation),
        RetryPolicy::once(),
    );
    let debug_summarize = b.add(
        c.gate("debug_summarize", Stage::Summarize, Proceed::Success),
        RetryPolicy::once(),
    );
    let debug_send = b.add(
        c.gate("debug_send", Stage::Send, Proceed::Success),
        RetryPolicy::once(),
    );

    b.then(fetch, debug_fetch);
    b.on(debug_fetch, Action::Success, detect)
        .on(debug_fetch, Action::Retry, fetch)
        .on(debug_fetch, Action::Fail, send);

    b.then(detect, debug_situation);
    b.on(debug_situation, Action::Normal, summarize)
        .on(debug_situation, Action::HolidayNotice, holiday)
        .on(debug_situation, Action::SpecialNotice, special)
        .on(debug_situation, Action::ErrorNotice, send)
        .on(debug_situation, Action::Retry, detect)
        .on(debug_situation, Action::Fail, send);

    b.then(summarize, debug_summarize);
    b.on(debug_summarize, Action::Success, send)
        .on(debug_summarize, Action::Retry, summarize)
        .on(debug_summarize, Action::Fail, send);

    b.then(send, debug_send);
    b.on(debug_send, Action::Retry, send);

    b.build(fetch)
}

/// The workflow without gates.
pub fn simple_menu_flow(c: &Collaborators) -> Result<Flow> {
    let mut b = Flow::builder();

    let fetch = b.add(c.fetch(), RetryPolicy::new(2, Duration::ZERO));
    let detect = b.add(c.detector(), RetryPolicy::new(2, Duration::ZERO));
    let holiday = b.add(c.holiday(), RetryPolicy::new(2, Duration::ZERO));
    let special = b.add(c.special(), RetryPolicy::new(2, Duration::ZERO));
    let summarize = b.add(c.summarizer(), RetryPolicy::new(2, Duration::ZERO));
    let send = b.add(c.sender(), RetryPolicy::new(2, Duration::ZERO));

    b.then(fetch, detect);
    b.on(detect, Action::Normal, summarize)
        .on(detect, Action::HolidayNotice, holiday)
        .on(detect, Action::SpecialNotice, special)
        .on(detect, Action::ErrorNotice, send);
    b.then(summarize, send);

    b.build(fetch)
}

/// Single-try graph that sends the holiday notice for normal posts too.
pub fn holiday_test_flow(c: &Collaborators) -> Result<Flow> {
    let mut b = Flow::builder();

    let fetch = b.add(c.fetch(), RetryPolicy::once());
    let detect = b.add(c.detector(), RetryPolicy::once());
    let holiday = b.add(c.holiday(), RetryPolicy::once());

    b.then(fetch, detect);
    b.on(detect, Action::HolidayNotice, holiday)
        .on(detect, Action::Normal, holiday);

    b.build(fetch)
}

/// Single-try graph that sends the special menu notice for normal posts too.
pub fn special_menu_test_flow(c: &Collaborators) -> Result<Flow> {
    let mut b = Flow::builder();

    let fetch = b.add(c.fetch(), RetryPolicy::once());
    let detect = b.add(c.detector(), RetryPolicy::once());
    let special = b.add(c.special(), RetryPolicy::once());

    b.then(fetch, detect);
    b.on(detect, Action::SpecialNotice, special)
        .on(detect, Action::Normal, special);

    b.build(fetch)
}
