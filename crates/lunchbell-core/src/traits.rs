use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;

/// Content source: where the menu post comes from.
pub trait ContentSource: Send + Sync + 'static {
    /// Source name for logs (e.g., "instagram").
    fn name(&self) -> &str;

    /// Fetch the latest post text for `locator`.
    ///
    /// Fails when the page is unreachable or yields no usable text.
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// LLM client: single prompt in, text out.
pub trait LlmClient: Send + Sync + 'static {
    /// Run one completion. Fails when the call errors or returns no text.
    fn complete<'a>(
        &'a self,
        config: &'a ModelConfig,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Delivery sink: posts a finished message somewhere a human will read it.
pub trait DeliverySink: Send + Sync + 'static {
    /// Sink name (e.g., "slack").
    fn name(&self) -> &str;

    /// Deliver `message` to `destination`. Returns whether it was accepted.
    fn deliver<'a>(&'a self, message: &'a str, destination: &'a str) -> BoxFuture<'a, bool>;
}

/// Wall clock, injectable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
