use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::DeliverySink;
use lunchbell_core::types::{Action, SharedContext};

use super::{deliver, Delivery};
use crate::graph::{Node, Outcome};
use crate::message::{self, LocalClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingKind {
    Menu,
    ErrorNotice,
}

#[derive(Debug, Clone)]
pub struct Outgoing {
    pub kind: OutgoingKind,
    pub text: String,
    pub channel: String,
}

/// Posts the menu summary, or an error notice when no summary exists.
///
/// Every path that abandons a stage ends here, so prep never fails: with no
/// summary it builds an error notice from the raw placeholder and the error
/// log.
pub struct SendSlackNode {
    sink: Arc<dyn DeliverySink>,
    clock: LocalClock,
}

impl SendSlackNode {
    pub fn new(sink: Arc<dyn DeliverySink>, clock: LocalClock) -> Self {
        Self { sink, clock }
    }
}

impl Node for SendSlackNode {
    type Prep = Outgoing;
    type Exec = Delivery;

    fn name(&self) -> &str {
        "send_slack"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<Outgoing> {
        let time = self.clock.label();
        let channel = ctx.config().channel.clone();
        let summary = ctx.data.summary.trim();

        let outgoing = if summary.is_empty() {
            let detail =
                message::error_detail(&ctx.data.raw_content, ctx.status.error_log.entries());
            Outgoing {
                kind: OutgoingKind::ErrorNotice,
                text: message::error_message(&detail, &time),
                channel,
            }
        } else {
            Outgoing {
                kind: OutgoingKind::Menu,
                text: message::menu_message(summary, &time),
                channel,
            }
        };
        info!(channel = %outgoing.channel, kind = ?outgoing.kind, "Preparing Slack message");
        Ok(outgoing)
    }

    fn exec<'a>(&'a self, outgoing: &'a Outgoing) -> BoxFuture<'a, Result<Delivery>> {
        Box::pin(deliver(self.sink.as_ref(), &outgoing.text, &outgoing.channel))
    }

    fn exec_fallback(&self, outgoing: &Outgoing, error: &LunchbellError) -> Delivery {
        warn!(channel = %outgoing.channel, error = %error, "Slack message not delivered");
        Delivery::Failed
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        outgoing: Outgoing,
        outcome: Outcome<Delivery>,
    ) -> Result<Action> {
        let delivered = outcome.into_value().is_delivered();

        ctx.status.send_success = delivered;
        ctx.status.final_success = delivered
            && outgoing.kind == OutgoingKind::Menu
            && ctx.status.summarize_success;
        if !delivered {
            ctx.status.error_log.push("슬랙 메시지 전송 실패");
        }

        info!(
            delivered,
            kind = ?outgoing.kind,
            final_success = ctx.status.final_success,
            "Slack send finished"
        );
        Ok(Action::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use lunchbell_core::types::RunConfig;
    use lunchbell_test_utils::{FixedClock, RecordingSink};

    use crate::graph::{RetryPolicy, Retrying, Step};

    fn step(sink: Arc<RecordingSink>) -> Retrying<SendSlackNode> {
        let clock = LocalClock::new(
            Arc::new(FixedClock::default()),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        );
        Retrying::new(SendSlackNode::new(sink, clock), RetryPolicy::with_wait_secs(2, 2))
    }

    fn ctx() -> SharedContext {
        SharedContext::new(RunConfig {
            source_url: "https://example.com".into(),
            channel: "#lunch".into(),
            debug_mode: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_menu_summary() {
        let sink = Arc::new(RecordingSink::new());
        let mut step = step(sink.clone());
        let mut ctx = ctx();
        ctx.data.summary = "🍽️ **오늘의 메뉴**\n- 불고기".into();
        ctx.status.summarize_success = true;

        step.invoke(&mut ctx).await.unwrap();

        assert!(ctx.status.send_success);
        assert!(ctx.status.final_success);
        let sent = sink.messages();
        assert_eq!(sent[0].destination, "#lunch");
        assert!(sent[0].text.contains("구도 한식뷔페 오늘의 메뉴"));
        assert!(sent[0].text.contains("불고기"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_summary_sends_error_notice() {
        let sink = Arc::new(RecordingSink::new());
        let mut step = step(sink.clone());
        let mut ctx = ctx();
        ctx.data.raw_content = "직접 인스타그램을 확인해주세요.".into();
        ctx.status.error_log.push("메뉴 수집 실패: 내용이 너무 짧음 (5 글자)");

        step.invoke(&mut ctx).await.unwrap();

        assert!(ctx.status.send_success);
        assert!(!ctx.status.final_success);
        let text = &sink.messages()[0].text;
        assert!(text.contains("메뉴 알림 시스템 오류"));
        assert!(text.contains("내용이 너무 짧음"));
        assert!(text.contains("직접 인스타그램"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_summary_is_not_final_success() {
        let sink = Arc::new(RecordingSink::new());
        let mut step = step(sink.clone());
        let mut ctx = ctx();
        ctx.data.summary = "🍽️ **오늘의 메뉴** (자동 요약 실패)".into();

        step.invoke(&mut ctx).await.unwrap();

        assert!(ctx.status.send_success);
        assert!(!ctx.status.final_success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_sink_is_logged_only() {
        let sink = Arc::new(RecordingSink::rejecting());
        let mut step = step(sink.clone());
        let mut ctx = ctx();
        ctx.data.summary = "메뉴".into();

        let inv = step.invoke(&mut ctx).await.unwrap();

        assert!(inv.degraded);
        assert_eq!(inv.action, Action::Default);
        assert!(!ctx.status.send_success);
        assert_eq!(ctx.status.error_log.total(), 1);
        // Two attempts, nothing extra from the fallback.
        assert_eq!(sink.messages().len(), 2);
    }
}
