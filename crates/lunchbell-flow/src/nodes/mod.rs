pub mod detect;
pub mod fetch;
pub mod notice;
pub mod send;
pub mod summarize;

pub use detect::{classify_by_keywords, SituationDetectorNode};
pub use fetch::FetchMenuNode;
pub use notice::{HolidayNoticeNode, SpecialMenuNode};
pub use send::{OutgoingKind, SendSlackNode};
pub use summarize::SummarizeMenuNode;

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::traits::DeliverySink;

/// Result of a delivery node's execute phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Deliver through `sink`, turning a rejected delivery into an error so the
/// retry wrapper tries again.
pub(crate) async fn deliver(
    sink: &dyn DeliverySink,
    text: &str,
    destination: &str,
) -> Result<Delivery> {
    if sink.deliver(text, destination).await {
        Ok(Delivery::Delivered)
    } else {
        Err(LunchbellError::DeliveryRejected {
            destination: destination.to_string(),
        })
    }
}
