use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LunchbellError, Result};
use crate::types::RunConfig;

/// Top-level lunchbell configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

/// Where the menu post is scraped from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_source_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_source_url() -> String { "https://www.instagram.com/sunaedong_buffet/".to_string() }
fn default_source_timeout() -> u64 { 30 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String { "gemini".to_string() }
fn default_model_id() -> String { "gemini-1.5-flash".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...) for Web API calls
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Channel the menu is posted to
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Channel that receives gate reports in debug mode
    #[serde(default = "default_debug_channel")]
    pub debug_channel: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel: default_channel(),
            debug_channel: default_debug_channel(),
        }
    }
}

fn default_channel() -> String { "#lunch-menu".to_string() }
fn default_debug_channel() -> String { "#lunch-menu-debug".to_string() }

/// Workflow tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Send gate reports to the debug channel (default: false).
    #[serde(default)]
    pub debug_mode: bool,
    /// Recorded errors at which gates stop retrying. Default: 3
    #[serde(default = "default_error_threshold")]
    pub error_threshold: usize,
    /// Upper bound for a whole run in seconds. Default: 600
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            error_threshold: default_error_threshold(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_error_threshold() -> usize { 3 }
fn default_run_timeout() -> u64 { 600 }

/// Daily trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression with a seconds field. Default: every day at 11:00.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Simple UTC offset in hours (e.g., 9 for KST). Default: 9
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

fn default_cron() -> String { "0 0 11 * * *".to_string() }
fn default_utc_offset() -> i32 { 9 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append log lines to this file in addition to stderr.
    #[serde(default)]
    pub file: Option<String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| LunchbellError::ConfigNotFound(path.display().to_string()))?;
        Self::parse(&content)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| LunchbellError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(LunchbellError::Config("source.url must not be empty".into()));
        }
        if self.slack.channel.trim().is_empty() {
            return Err(LunchbellError::Config("slack.channel must not be empty".into()));
        }
        if self.flow.error_threshold == 0 {
            return Err(LunchbellError::Config(
                "flow.error_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The run parameters handed to every fresh `SharedContext`.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            source_url: self.source.url.clone(),
            channel: self.slack.channel.clone(),
            debug_mode: self.flow.debug_mode,
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// True when a secret is present and is not an unexpanded `${VAR}` reference.
pub fn is_secret_set(value: Option<&str>) -> bool {
    value.map_or(false, |v| !v.trim().is_empty() && !v.starts_with("${"))
}
