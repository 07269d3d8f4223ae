use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::DeliverySink;
use lunchbell_core::types::{Action, DebugReport, SharedContext, SituationKind, Stage};

use crate::graph::{Node, Outcome};
use crate::message::{self, LocalClock};

/// Label a gate returns once every guarded stage succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proceed {
    /// Plain `Action::Success`.
    Success,
    /// The situation classification's label; a missing analysis counts as
    /// normal.
    Situation,
}

/// Settings shared by every gate in one graph.
#[derive(Clone)]
pub struct GatePolicy {
    pub error_threshold: usize,
    pub debug_channel: String,
    pub sink: Arc<dyn DeliverySink>,
    pub clock: LocalClock,
}

/// Snapshot a gate decides from.
#[derive(Debug, Clone)]
pub struct GateInput {
    pub fetch_success: bool,
    pub situation_detected: bool,
    pub summarize_success: bool,
    pub send_success: bool,
    pub scoped_ok: bool,
    pub situation: Option<SituationKind>,
    pub error_count: usize,
    pub error_log: Vec<String>,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub debug_mode: bool,
}

/// Proceed / retry / abandon decision node.
///
/// Reads the status flags of the stages it guards and the run's error
/// counter. Proceeds when every guarded stage succeeded, abandons once the
/// counter reached the threshold, otherwise asks for a retry. Since the
/// counter never decreases, a gate that abandoned once abandons on every
/// later visit unless its stages recover.
pub struct DebugCheckNode {
    name: String,
    scope: Vec<Stage>,
    proceed: Proceed,
    policy: GatePolicy,
}

impl DebugCheckNode {
    pub fn new(
        name: impl Into<String>,
        scope: impl Into<Vec<Stage>>,
        proceed: Proceed,
        policy: GatePolicy,
    ) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            proceed,
            policy,
        }
    }

    pub fn decide(&self, input: &GateInput) -> Action {
        if input.scoped_ok {
            match self.proceed {
                Proceed::Success => Action::Success,
                Proceed::Situation => input.situation.unwrap_or_default().action(),
            }
        } else if input.error_count >= self.policy.error_threshold {
            Action::Fail
        } else {
            Action::Retry
        }
    }

    fn report(&self, input: &GateInput, action: Action) -> DebugReport {
        DebugReport {
            gate: self.name.clone(),
            fetch_success: input.fetch_success,
            situation_detected: input.situation_detected,
            summarize_success: input.summarize_success,
            send_success: input.send_success,
            all_success: input.scoped_ok,
            error_count: input.error_count,
            last_run: input.last_run,
            details: message::stage_details(
                input.fetch_success,
                input.situation_detected,
                input.summarize_success,
                input.send_success,
            ),
            error_log: input.error_log.clone(),
            action,
        }
    }
}

impl Node for DebugCheckNode {
    type Prep = GateInput;
    type Exec = DebugReport;

    fn name(&self) -> &str {
        &self.name
    }

    fn prep(&self, ctx: &SharedContext) -> Result<GateInput> {
        let status = &ctx.status;
        Ok(GateInput {
            fetch_success: status.fetch_success,
            situation_detected: status.situation_detected,
            summarize_success: status.summarize_success,
            send_success: status.send_success,
            scoped_ok: self.scope.iter().all(|s| status.stage_ok(*s)),
            situation: ctx.data.situation.as_ref().map(|a| a.situation_type),
            error_count: status.error_log.total(),
            error_log: status.error_log.to_vec(),
            last_run: status.last_run,
            debug_mode: ctx.config().debug_mode,
        })
    }

    fn exec<'a>(&'a self, input: &'a GateInput) -> BoxFuture<'a, Result<DebugReport>> {
        Box::pin(async move {
            let action = self.decide(input);
            let report = self.report(input, action);

            if input.debug_mode {
                let text = message::debug_message(&report, &self.policy.clock.label());
                let delivered = self
                    .policy
                    .sink
                    .deliver(&text, &self.policy.debug_channel)
                    .await;
                if !delivered {
                    warn!(gate = %self.name, channel = %self.policy.debug_channel, "Debug report not delivered");
                }
            }

            Ok(report)
        })
    }

    fn exec_fallback(&self, input: &GateInput, _error: &LunchbellError) -> DebugReport {
        self.report(input, self.decide(input))
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        _input: GateInput,
        outcome: Outcome<DebugReport>,
    ) -> Result<Action> {
        let report = outcome.into_value();
        let action = report.action;
        info!(
            gate = %self.name,
            %action,
            error_count = report.error_count,
            guarded_ok = report.all_success,
            "Gate decision"
        );
        ctx.status.debug_info = Some(report);
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use lunchbell_core::traits::SystemClock;
    use lunchbell_core::types::{RunConfig, SituationAnalysis};
    use lunchbell_test_utils::RecordingSink;

    use crate::graph::{RetryPolicy, Retrying, Step};

    fn policy(sink: Arc<RecordingSink>) -> GatePolicy {
        GatePolicy {
            error_threshold: 3,
            debug_channel: "#debug".into(),
            sink,
            clock: LocalClock::new(
                Arc::new(SystemClock),
                FixedOffset::east_opt(9 * 3600).unwrap(),
            ),
        }
    }

    fn ctx(debug_mode: bool) -> SharedContext {
        SharedContext::new(RunConfig {
            source_url: "https://example.com".into(),
            channel: "#lunch".into(),
            debug_mode,
        })
    }

    fn fetch_gate(sink: Arc<RecordingSink>) -> Retrying<DebugCheckNode> {
        Retrying::new(
            DebugCheckNode::new("debug_fetch", [Stage::Fetch], Proceed::Success, policy(sink)),
            RetryPolicy::once(),
        )
    }

    #[tokio::test]
    async fn test_proceeds_when_scoped_stage_ok() {
        let mut gate = fetch_gate(Arc::new(RecordingSink::new()));
        let mut ctx = ctx(false);
        ctx.status.fetch_success = true;
        ctx.status.error_log.push("unrelated");

        let inv = gate.invoke(&mut ctx).await.unwrap();
        assert_eq!(inv.action, Action::Success);
        assert!(ctx.status.debug_info.as_ref().unwrap().all_success);
    }

    #[tokio::test]
    async fn test_ignores_stages_outside_scope() {
        let mut gate = fetch_gate(Arc::new(RecordingSink::new()));
        let mut ctx = ctx(false);
        ctx.status.fetch_success = true;
        // Later stages have not run yet.
        assert!(!ctx.status.summarize_success);

        let inv = gate.invoke(&mut ctx).await.unwrap();
        assert_eq!(inv.action, Action::Success);
    }

    #[tokio::test]
    async fn test_retry_below_threshold_then_fail() {
        let mut gate = fetch_gate(Arc::new(RecordingSink::new()));
        let mut ctx = ctx(false);

        let mut actions = Vec::new();
        for i in 0..4 {
            ctx.status.error_log.push(format!("error {i}"));
            actions.push(gate.invoke(&mut ctx).await.unwrap().action);
        }
        assert_eq!(
            actions,
            vec![Action::Retry, Action::Retry, Action::Fail, Action::Fail]
        );
    }

    #[tokio::test]
    async fn test_situation_gate_proceeds_with_classification() {
        let sink = Arc::new(RecordingSink::new());
        let mut gate = Retrying::new(
            DebugCheckNode::new("debug_situation", [Stage::Detect], Proceed::Situation, policy(sink)),
            RetryPolicy::once(),
        );
        let mut ctx = ctx(false);
        ctx.status.situation_detected = true;
        ctx.data.situation = Some(SituationAnalysis {
            situation_type: SituationKind::Holiday,
            confidence: 0.9,
            detected_keywords: vec![],
            summary: String::new(),
            action_required: String::new(),
        });

        let inv = gate.invoke(&mut ctx).await.unwrap();
        assert_eq!(inv.action, Action::HolidayNotice);
    }

    #[tokio::test]
    async fn test_situation_gate_missing_analysis_is_normal() {
        let sink = Arc::new(RecordingSink::new());
        let mut gate = Retrying::new(
            DebugCheckNode::new("debug_situation", [Stage::Detect], Proceed::Situation, policy(sink)),
            RetryPolicy::once(),
        );
        let mut ctx = ctx(false);
        ctx.status.situation_detected = true;

        let inv = gate.invoke(&mut ctx).await.unwrap();
        assert_eq!(inv.action, Action::Normal);
    }

    #[tokio::test]
    async fn test_debug_mode_reports_to_debug_channel() {
        let sink = Arc::new(RecordingSink::new());
        let mut gate = fetch_gate(sink.clone());
        let mut ctx = ctx(true);

        gate.invoke(&mut ctx).await.unwrap();

        let sent = sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "#debug");
        assert!(sent[0].text.contains("디버그 정보"));
    }

    #[tokio::test]
    async fn test_debug_delivery_failure_does_not_change_label() {
        let sink = Arc::new(RecordingSink::rejecting());
        let mut gate = fetch_gate(sink.clone());
        let mut ctx = ctx(true);
        ctx.status.fetch_success = true;

        let inv = gate.invoke(&mut ctx).await.unwrap();
        assert_eq!(inv.action, Action::Success);
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_quiet_without_debug_mode() {
        let sink = Arc::new(RecordingSink::new());
        let mut gate = fetch_gate(sink.clone());
        gate.invoke(&mut ctx(false)).await.unwrap();
        assert!(sink.messages().is_empty());
    }
}
