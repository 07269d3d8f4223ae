use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::DeliverySink;
use lunchbell_core::types::{Action, SharedContext, SituationAnalysis};

use super::{deliver, Delivery};
use crate::graph::{Node, Outcome};
use crate::message::{self, LocalClock};

/// A formatted notice and where it goes.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub channel: String,
}

fn require_analysis<'a>(node: &str, ctx: &'a SharedContext) -> Result<&'a SituationAnalysis> {
    ctx.data
        .situation
        .as_ref()
        .ok_or_else(|| LunchbellError::missing(node, "data.situation"))
}

/// Records a terminal notice delivery. Returns `Action::Default`, which
/// ends the run in every shipped graph.
fn record_delivery(ctx: &mut SharedContext, delivery: Delivery, what: &str) -> bool {
    let delivered = delivery.is_delivered();
    ctx.status.send_success = delivered;
    ctx.status.final_success = delivered;
    if !delivered {
        ctx.status.error_log.push(format!("{what} 전송 실패"));
    }
    delivered
}

/// Tells the channel the restaurant is closed today.
pub struct HolidayNoticeNode {
    sink: Arc<dyn DeliverySink>,
    clock: LocalClock,
}

impl HolidayNoticeNode {
    pub fn new(sink: Arc<dyn DeliverySink>, clock: LocalClock) -> Self {
        Self { sink, clock }
    }
}

impl Node for HolidayNoticeNode {
    type Prep = Notice;
    type Exec = Delivery;

    fn name(&self) -> &str {
        "holiday_notice"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<Notice> {
        let analysis = require_analysis(self.name(), ctx)?;
        Ok(Notice {
            text: message::holiday_message(analysis, &self.clock.label()),
            channel: ctx.config().channel.clone(),
        })
    }

    fn exec<'a>(&'a self, notice: &'a Notice) -> BoxFuture<'a, Result<Delivery>> {
        Box::pin(deliver(self.sink.as_ref(), &notice.text, &notice.channel))
    }

    fn exec_fallback(&self, notice: &Notice, error: &LunchbellError) -> Delivery {
        warn!(channel = %notice.channel, error = %error, "Holiday notice not delivered");
        Delivery::Failed
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        _notice: Notice,
        outcome: Outcome<Delivery>,
    ) -> Result<Action> {
        let delivered = record_delivery(ctx, outcome.into_value(), "휴무 안내");
        ctx.status.holiday_notice_sent = delivered;
        info!(delivered, "Holiday notice finished");
        Ok(Action::Default)
    }
}

/// Announces a special or event menu, quoting the original post.
pub struct SpecialMenuNode {
    sink: Arc<dyn DeliverySink>,
    clock: LocalClock,
}

impl SpecialMenuNode {
    pub fn new(sink: Arc<dyn DeliverySink>, clock: LocalClock) -> Self {
        Self { sink, clock }
    }
}

impl Node for SpecialMenuNode {
    type Prep = Notice;
    type Exec = Delivery;

    fn name(&self) -> &str {
        "special_menu"
    }

    fn prep(&self, ctx: &SharedContext) -> Result<Notice> {
        let analysis = require_analysis(self.name(), ctx)?;
        Ok(Notice {
            text: message::special_menu_message(
                analysis,
                &ctx.data.raw_content,
                &self.clock.label(),
            ),
            channel: ctx.config().channel.clone(),
        })
    }

    fn exec<'a>(&'a self, notice: &'a Notice) -> BoxFuture<'a, Result<Delivery>> {
        Box::pin(deliver(self.sink.as_ref(), &notice.text, &notice.channel))
    }

    fn exec_fallback(&self, notice: &Notice, error: &LunchbellError) -> Delivery {
        warn!(channel = %notice.channel, error = %error, "Special menu notice not delivered");
        Delivery::Failed
    }

    fn post(
        &self,
        ctx: &mut SharedContext,
        _notice: Notice,
        outcome: Outcome<Delivery>,
    ) -> Result<Action> {
        let delivered = record_delivery(ctx, outcome.into_value(), "특별 메뉴 안내");
        ctx.status.special_menu_sent = delivered;
        info!(delivered, "Special menu notice finished");
        Ok(Action::Default)
    }
}
