use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use lunchbell_core::config::AppConfig;
use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::types::{RunConfig, SharedContext};

use crate::builder::Collaborators;
use crate::graph::{Flow, RunReport};
use crate::message::{self, LocalClock};

/// Builds the graph a run executes.
pub type FlowFactory = fn(&Collaborators) -> Result<Flow>;

/// Everything a finished run left behind.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub context: SharedContext,
    pub report: Option<RunReport>,
    /// Set when the run aborted on a contract failure or the timeout.
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.context.status.final_success
    }
}

/// Runs one workflow at a time, each with a fresh graph and context.
pub struct WorkflowRunner {
    collaborators: Collaborators,
    run_config: RunConfig,
    run_timeout: Duration,
}

impl WorkflowRunner {
    pub fn new(collaborators: Collaborators, run_config: RunConfig, run_timeout: Duration) -> Self {
        Self {
            collaborators,
            run_config,
            run_timeout,
        }
    }

    pub fn from_config(config: &AppConfig, collaborators: Collaborators) -> Self {
        Self::new(
            collaborators,
            config.run_config(),
            Duration::from_secs(config.flow.run_timeout_secs),
        )
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    /// Run the graph from `build` against a fresh context.
    ///
    /// Never fails: a fatal error or a timeout is logged, reported to the
    /// channel as an error notice, and returned in the outcome.
    pub async fn run(&self, build: FlowFactory) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let ctx = SharedContext::new(self.run_config.clone());
        self.execute(build, ctx)
            .instrument(info_span!("run", run_id = %run_id))
            .await
            .with_id(run_id)
    }

    async fn execute(&self, build: FlowFactory, mut ctx: SharedContext) -> Partial {
        info!(channel = %self.run_config.channel, "Menu workflow starting");

        let result = match build(&self.collaborators) {
            Ok(mut flow) => {
                match tokio::time::timeout(self.run_timeout, flow.run(&mut ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(LunchbellError::Timeout(self.run_timeout.as_secs())),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                if ctx.status.final_success {
                    info!(
                        steps = report.steps.len(),
                        elapsed_ms = report.total_elapsed_ms,
                        "Menu workflow completed"
                    );
                } else {
                    warn!(
                        steps = report.steps.len(),
                        errors = ctx.status.error_log.total(),
                        "Menu workflow finished with problems"
                    );
                }
                Partial {
                    context: ctx,
                    report: Some(report),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, contract = e.is_contract_violation(), "Menu workflow aborted");
                self.notify_failure(&e).await;
                Partial {
                    context: ctx,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn notify_failure(&self, e: &LunchbellError) {
        let clock = LocalClock::new(
            self.collaborators.clock.clone(),
            self.collaborators.utc_offset,
        );
        let text = message::error_message(&format!("메뉴 알림 시스템 오류: {e}"), &clock.label());
        let channel = &self.run_config.channel;
        if !self.collaborators.sink.deliver(&text, channel).await {
            warn!(channel = %channel, "Failure notice not delivered");
        }
    }
}

struct Partial {
    context: SharedContext,
    report: Option<RunReport>,
    error: Option<String>,
}

impl Partial {
    fn with_id(self, run_id: Uuid) -> RunOutcome {
        RunOutcome {
            run_id,
            context: self.context,
            report: self.report,
            error: self.error,
        }
    }
}
