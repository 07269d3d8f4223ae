mod doctor;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lunchbell_channels::{ConsoleSink, SlackClient};
use lunchbell_core::config::{AppConfig, LogConfig};
use lunchbell_core::traits::{ContentSource, DeliverySink, LlmClient, SystemClock};
use lunchbell_flow::{
    holiday_test_flow, menu_notification_flow, simple_menu_flow, special_menu_test_flow,
    Collaborators, DailyScheduler, FlowFactory, RunOutcome, WorkflowRunner,
};
use lunchbell_source::{FixedSource, InstagramSource};

#[derive(Parser)]
#[command(name = "lunchbell", version, about = "Daily lunch menu notifications for Slack")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "lunchbell.toml")]
    config: PathBuf,

    /// Print messages to the terminal instead of posting to Slack
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run every day at the configured time (default)
    Schedule,
    /// Run the full workflow once, right now
    Now,
    /// Send a sample menu through the simple workflow
    Test,
    /// Send a sample closed-day post through the holiday branch
    HolidayTest,
    /// Send a sample event post through the special menu branch
    SpecialTest,
    /// Check keys, tokens and schedule without running anything
    Check,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "lunchbell", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    init_tracing(config.log.as_ref())?;

    let command = cli.command.unwrap_or(Commands::Schedule);
    if command == Commands::Check {
        println!("Lunchbell Check");
        println!("===============");
        doctor::run_doctor(&config);
        return Ok(());
    }

    let runner = build_runner(&config, command, cli.dry_run)?;

    match command {
        Commands::Now => run_once(&runner, menu_notification_flow).await,
        Commands::Test => run_once(&runner, simple_menu_flow).await,
        Commands::HolidayTest => run_once(&runner, holiday_test_flow).await,
        Commands::SpecialTest => run_once(&runner, special_menu_test_flow).await,
        Commands::Schedule => run_schedule(&config, &runner).await,
        Commands::Check | Commands::Completions { .. } => unreachable!("handled above"),
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        eprintln!(
            "Warning: {} not found, using defaults. Set GEMINI_API_KEY and SLACK_BOT_TOKEN in a config file.",
            path.display()
        );
        Ok(AppConfig::default())
    }
}

/// Stderr logging filtered by `RUST_LOG`, plus an ANSI-free file copy when
/// `[log] file` is set.
fn init_tracing(log: Option<&LogConfig>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lunchbell=info,warn"));

    let file_layer = match log.and_then(|l| l.file.as_deref()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    Ok(())
}

fn build_runner(
    config: &AppConfig,
    command: Commands,
    dry_run: bool,
) -> anyhow::Result<WorkflowRunner> {
    let source: Arc<dyn ContentSource> = match command {
        Commands::Test => Arc::new(FixedSource::normal_menu()),
        Commands::HolidayTest => Arc::new(FixedSource::holiday()),
        Commands::SpecialTest => Arc::new(FixedSource::special_menu()),
        _ => Arc::new(InstagramSource::new(&config.source).context("building scraper")?),
    };

    let sink: Arc<dyn DeliverySink> = if dry_run {
        Arc::new(ConsoleSink)
    } else {
        let slack = SlackClient::from_config(&config.slack);
        if !slack.has_token() {
            warn!("No Slack bot token configured; deliveries will fail (use --dry-run to print instead)");
        }
        Arc::new(slack)
    };

    let llm: Arc<dyn LlmClient> = Arc::from(
        lunchbell_llm::create_chain(&config.model, &config.fallback_models)
            .context("building LLM client")?,
    );

    let collaborators =
        Collaborators::from_config(config, source, llm, sink, Arc::new(SystemClock))
            .context("wiring workflow")?;

    info!(
        provider = %config.model.provider,
        model = %config.model.model_id,
        channel = %config.slack.channel,
        dry_run,
        "Workflow ready"
    );
    Ok(WorkflowRunner::from_config(config, collaborators))
}

async fn run_once(runner: &WorkflowRunner, build: FlowFactory) -> anyhow::Result<()> {
    let outcome = runner.run(build).await;
    print_status(&outcome);
    match outcome.error {
        Some(e) => anyhow::bail!("run {} failed: {}", outcome.run_id, e),
        None => Ok(()),
    }
}

async fn run_schedule(config: &AppConfig, runner: &WorkflowRunner) -> anyhow::Result<()> {
    let cancel = tokio_util::sync::CancellationToken::new();
    let scheduler =
        DailyScheduler::new(&config.schedule, cancel.clone()).context("invalid [schedule]")?;

    match scheduler.next_run_time() {
        Some(next) => println!(
            "Lunchbell scheduled ({}). Next run: {}",
            scheduler.expression(),
            next.format("%Y-%m-%d %H:%M:%S %:z")
        ),
        None => println!("Lunchbell schedule '{}' never fires", scheduler.expression()),
    }
    println!("Press Ctrl-C to stop.");

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        cancel_clone.cancel();
    });

    scheduler
        .run(move || async move {
            let outcome = runner.run(menu_notification_flow).await;
            if let Some(e) = &outcome.error {
                error!(run_id = %outcome.run_id, error = %e, "Scheduled run failed");
            } else {
                info!(
                    run_id = %outcome.run_id,
                    final_success = outcome.context.status.final_success,
                    "Scheduled run finished"
                );
            }
        })
        .await;

    Ok(())
}

fn print_status(outcome: &RunOutcome) {
    let status = &outcome.context.status;

    println!();
    println!("Run {}", outcome.run_id);
    println!("  {:<20} {}", "fetch_success", status.fetch_success);
    println!("  {:<20} {}", "situation_detected", status.situation_detected);
    println!("  {:<20} {}", "summarize_success", status.summarize_success);
    println!("  {:<20} {}", "send_success", status.send_success);
    println!("  {:<20} {}", "holiday_notice_sent", status.holiday_notice_sent);
    println!("  {:<20} {}", "special_menu_sent", status.special_menu_sent);
    println!("  {:<20} {}", "final_success", status.final_success);
    if let Some(situation) = &outcome.context.data.situation {
        println!(
            "  {:<20} {:?} ({:.0}%)",
            "situation",
            situation.situation_type,
            situation.confidence * 100.0
        );
    }
    println!("  {:<20} {}", "errors", status.error_log.total());
    for entry in status.error_log.entries() {
        println!("    - {}", entry);
    }
    if let Some(report) = &outcome.report {
        println!(
            "  {:<20} {} ({} ms)",
            "path",
            report.path().join(" -> "),
            report.total_elapsed_ms
        );
    }
    if let Some(e) = &outcome.error {
        println!("  {:<20} {}", "error", e);
    }
}
