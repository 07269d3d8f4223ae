use std::path::Path;

use tokio_util::sync::CancellationToken;

use lunchbell_channels::util::mask_secret;
use lunchbell_core::config::{is_secret_set, AppConfig, ModelConfig};
use lunchbell_flow::DailyScheduler;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn ok(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn issue(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

pub fn run_doctor(config: &AppConfig) {
    let mut checks = vec![
        check_api_key("API Key", &config.model),
        check_slack(config),
        check_schedule(config),
        check_source(config),
    ];
    for (i, model) in config.fallback_models.iter().enumerate() {
        checks.push(check_api_key(&format!("Fallback #{}", i + 1), model));
    }
    if let Some(path) = config.log.as_ref().and_then(|l| l.file.as_deref()) {
        checks.push(check_log_file(Path::new(path)));
    }

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_api_key(label: &str, model: &ModelConfig) -> CheckResult {
    if let Err(e) = lunchbell_llm::create_client(model) {
        return CheckResult::issue(label, e.to_string());
    }

    let key = model.api_key.as_deref();
    if is_secret_set(key) {
        CheckResult::ok(
            label,
            format!(
                "{} ({}) key {}",
                model.model_id,
                model.provider,
                mask_secret(key.unwrap_or_default())
            ),
        )
    } else if model.provider == "ollama" {
        CheckResult::ok(label, format!("{} (ollama, no key needed)", model.model_id))
    } else {
        CheckResult::issue(
            label,
            format!("No API key set for provider '{}'", model.provider),
        )
    }
}

fn check_slack(config: &AppConfig) -> CheckResult {
    let slack = &config.slack;
    let token = slack.bot_token.as_deref();
    if !is_secret_set(token) {
        return CheckResult::issue("Slack", "No bot token set (SLACK_BOT_TOKEN)");
    }

    CheckResult::ok(
        "Slack",
        format!(
            "token {}, posting to {} (debug: {})",
            mask_secret(token.unwrap_or_default()),
            slack.channel,
            slack.debug_channel
        ),
    )
}

fn check_schedule(config: &AppConfig) -> CheckResult {
    match DailyScheduler::new(&config.schedule, CancellationToken::new()) {
        Ok(scheduler) => match scheduler.next_run_time() {
            Some(next) => CheckResult::ok(
                "Schedule",
                format!(
                    "'{}', next run {}",
                    scheduler.expression(),
                    next.format("%Y-%m-%d %H:%M %:z")
                ),
            ),
            None => CheckResult::issue(
                "Schedule",
                format!("'{}' never fires", scheduler.expression()),
            ),
        },
        Err(e) => CheckResult::issue("Schedule", e.to_string()),
    }
}

fn check_source(config: &AppConfig) -> CheckResult {
    let url = &config.source.url;
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return CheckResult::issue("Source", format!("'{}' is not an http(s) URL", url));
    }
    if config.source.timeout_secs == 0 {
        return CheckResult::issue("Source", "timeout_secs must be greater than 0");
    }
    CheckResult::ok(
        "Source",
        format!("{} (timeout {}s)", url, config.source.timeout_secs),
    )
}

fn check_log_file(path: &Path) -> CheckResult {
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(_) => CheckResult::ok("Log File", path.display().to_string()),
        Err(e) => CheckResult::issue("Log File", format!("{} ({})", path.display(), e)),
    }
}
