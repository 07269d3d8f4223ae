use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::types::{Action, SharedContext};

/// A unit of work in the flow graph.
///
/// A node runs in three phases:
/// - `prep` reads what it needs out of the context. A failure here means the
///   context is missing something it must have and aborts the run.
/// - `exec` performs the fallible external action. It is retried by the
///   [`Retrying`] wrapper, and when every attempt fails `exec_fallback`
///   produces a substitute instead.
/// - `post` records the result in the context and picks the routing label.
///   It must not perform the external action itself.
pub trait Node: Send + Sync + 'static {
    type Prep: Send + Sync;
    type Exec: Send;

    fn name(&self) -> &str;

    fn prep(&self, ctx: &SharedContext) -> Result<Self::Prep>;

    fn exec<'a>(&'a self, prep: &'a Self::Prep) -> BoxFuture<'a, Result<Self::Exec>>;

    /// Substitute result once retries are exhausted. Must be deterministic in
    /// `prep` and `error`.
    fn exec_fallback(&self, prep: &Self::Prep, error: &LunchbellError) -> Self::Exec;

    fn post(
        &self,
        ctx: &mut SharedContext,
        prep: Self::Prep,
        outcome: Outcome<Self::Exec>,
    ) -> Result<Action>;
}

/// What the execute phase produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Succeeded(T),
    /// Every attempt failed; `value` came from `exec_fallback`.
    Degraded { value: T, error: String },
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Succeeded(v) => v,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Succeeded(v) => v,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::Degraded { error, .. } => Some(error),
        }
    }
}

/// Bounded retry settings for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    wait: Duration,
}

impl RetryPolicy {
    /// `max_retries` counts total attempts and is clamped to at least 1.
    pub fn new(max_retries: u32, wait: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            wait,
        }
    }

    pub fn with_wait_secs(max_retries: u32, wait_secs: u64) -> Self {
        Self::new(max_retries, Duration::from_secs(wait_secs))
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Result of one node invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub action: Action,
    /// Execute attempts used by this invocation.
    pub attempts: u32,
    pub degraded: bool,
    pub elapsed_ms: u64,
}

/// Object-safe view of a node used by the router.
pub trait Step: Send {
    fn name(&self) -> &str;

    fn invoke<'a>(&'a mut self, ctx: &'a mut SharedContext) -> BoxFuture<'a, Result<Invocation>>;
}

/// Drives a [`Node`] through prep, retried exec and post.
pub struct Retrying<N: Node> {
    node: N,
    policy: RetryPolicy,
    cur_retry: u32,
}

impl<N: Node> Retrying<N> {
    pub fn new(node: N, policy: RetryPolicy) -> Self {
        Self {
            node,
            policy,
            cur_retry: 0,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn exec_with_retry(&mut self, prep: &N::Prep) -> Outcome<N::Exec> {
        self.cur_retry = 0;
        loop {
            self.cur_retry += 1;
            match self.node.exec(prep).await {
                Ok(value) => return Outcome::Succeeded(value),
                Err(e) => {
                    if self.cur_retry >= self.policy.max_retries {
                        warn!(
                            node = %self.node.name(),
                            attempts = self.cur_retry,
                            error = %e,
                            "Retries exhausted, using fallback"
                        );
                        let value = self.node.exec_fallback(prep, &e);
                        return Outcome::Degraded {
                            value,
                            error: e.to_string(),
                        };
                    }
                    warn!(
                        node = %self.node.name(),
                        attempt = self.cur_retry,
                        max_retries = self.policy.max_retries,
                        wait_ms = self.policy.wait.as_millis() as u64,
                        error = %e,
                        "Node exec failed, retrying"
                    );
                    if !self.policy.wait.is_zero() {
                        tokio::time::sleep(self.policy.wait).await;
                    }
                }
            }
        }
    }

    async fn run_lifecycle(&mut self, ctx: &mut SharedContext) -> Result<Invocation> {
        let start = Instant::now();

        let prep = self.node.prep(ctx).map_err(|e| {
            error!(node = %self.node.name(), error = %e, "Node prep failed");
            e
        })?;

        let outcome = self.exec_with_retry(&prep).await;
        let degraded = outcome.is_degraded();

        let action = self.node.post(ctx, prep, outcome).map_err(|e| {
            error!(node = %self.node.name(), error = %e, "Node post failed");
            e
        })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            node = %self.node.name(),
            %action,
            attempts = self.cur_retry,
            degraded,
            elapsed_ms,
            "Node invocation complete"
        );

        Ok(Invocation {
            action,
            attempts: self.cur_retry,
            degraded,
            elapsed_ms,
        })
    }
}

impl<N: Node> Step for Retrying<N> {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn invoke<'a>(&'a mut self, ctx: &'a mut SharedContext) -> BoxFuture<'a, Result<Invocation>> {
        Box::pin(self.run_lifecycle(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use lunchbell_core::types::RunConfig;

    fn ctx() -> SharedContext {
        SharedContext::new(RunConfig {
            source_url: "https://example.com".into(),
            channel: "#test".into(),
            debug_mode: false,
        })
    }

    /// Fails the first `fail_times` calls, then echoes its prep value.
    struct Flaky {
        fail_times: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(fail_times: u32) -> Self {
            Self {
                fail_times,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Node for Flaky {
        type Prep = String;
        type Exec = String;

        fn name(&self) -> &str {
            "flaky"
        }

        fn prep(&self, ctx: &SharedContext) -> Result<String> {
            Ok(ctx.config().source_url.clone())
        }

        fn exec<'a>(&'a self, prep: &'a String) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= self.fail_times {
                    Err(LunchbellError::Source(format!("attempt {n} failed")))
                } else {
                    Ok(prep.clone())
                }
            })
        }

        fn exec_fallback(&self, prep: &String, error: &LunchbellError) -> String {
            format!("fallback for {prep}: {error}")
        }

        fn post(
            &self,
            ctx: &mut SharedContext,
            _prep: String,
            outcome: Outcome<String>,
        ) -> Result<Action> {
            let degraded = outcome.is_degraded();
            ctx.data.raw_content = outcome.into_value();
            Ok(if degraded { Action::Fail } else { Action::Success })
        }
    }

    struct BrokenPrep;

    impl Node for BrokenPrep {
        type Prep = ();
        type Exec = ();

        fn name(&self) -> &str {
            "broken"
        }

        fn prep(&self, _ctx: &SharedContext) -> Result<()> {
            Err(LunchbellError::missing("broken", "data.summary"))
        }

        fn exec<'a>(&'a self, _prep: &'a ()) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }

        fn exec_fallback(&self, _prep: &(), _error: &LunchbellError) {}

        fn post(&self, _ctx: &mut SharedContext, _prep: (), _o: Outcome<()>) -> Result<Action> {
            Ok(Action::Default)
        }
    }

    #[test]
    fn test_policy_clamps_to_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_retries(), 1);
        assert_eq!(RetryPolicy::with_wait_secs(3, 5).wait(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_node_tries_exactly_max_retries() {
        let mut step = Retrying::new(Flaky::new(u32::MAX), RetryPolicy::with_wait_secs(3, 5));
        let mut ctx = ctx();

        let inv = step.invoke(&mut ctx).await.unwrap();

        assert_eq!(step.node().calls.load(Ordering::SeqCst), 3);
        assert_eq!(inv.attempts, 3);
        assert!(inv.degraded);
        assert_eq!(inv.action, Action::Fail);
        assert!(ctx.data.raw_content.starts_with("fallback for https://example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_later_attempt() {
        let mut step = Retrying::new(Flaky::new(1), RetryPolicy::with_wait_secs(2, 3));
        let mut ctx = ctx();

        let inv = step.invoke(&mut ctx).await.unwrap();

        assert_eq!(inv.attempts, 2);
        assert!(!inv.degraded);
        assert_eq!(inv.action, Action::Success);
        assert_eq!(ctx.data.raw_content, "https://example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts_only() {
        let mut step = Retrying::new(Flaky::new(u32::MAX), RetryPolicy::with_wait_secs(3, 5));
        let mut ctx = ctx();
        let before = tokio::time::Instant::now();

        step.invoke(&mut ctx).await.unwrap();

        // Two waits between three attempts, none after the last.
        assert_eq!(before.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_counter_resets_per_invocation() {
        let mut step = Retrying::new(Flaky::new(1), RetryPolicy::with_wait_secs(3, 0));
        let mut ctx = ctx();

        let first = step.invoke(&mut ctx).await.unwrap();
        let second = step.invoke(&mut ctx).await.unwrap();

        assert_eq!(first.attempts, 2);
        assert_eq!(second.attempts, 1);
    }

    #[tokio::test]
    async fn test_prep_failure_propagates_without_exec() {
        let mut step = Retrying::new(BrokenPrep, RetryPolicy::with_wait_secs(3, 0));
        let mut ctx = ctx();

        let err = step.invoke(&mut ctx).await.unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let node = Flaky::new(0);
        let err = LunchbellError::Source("down".into());
        let a = node.exec_fallback(&"u".to_string(), &err);
        let b = node.exec_fallback(&"u".to_string(), &err);
        assert_eq!(a, b);
    }
}
