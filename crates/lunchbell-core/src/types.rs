use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing label returned by a node's finalize phase.
///
/// The set is closed so every transition table can be checked against it.
/// `Success`, `Retry` and `Fail` are the gate's proceed / retry / abandon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Default,
    Success,
    Retry,
    Fail,
    Normal,
    HolidayNotice,
    SpecialNotice,
    ErrorNotice,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Default => "default",
            Action::Success => "success",
            Action::Retry => "retry",
            Action::Fail => "fail",
            Action::Normal => "normal",
            Action::HolidayNotice => "holiday_notice",
            Action::SpecialNotice => "special_notice",
            Action::ErrorNotice => "error_notice",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages whose health is tracked in [`RunStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Detect,
    Summarize,
    Send,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Detect => "detect",
            Stage::Summarize => "summarize",
            Stage::Send => "send",
        }
    }
}

/// Run parameters. Read-only once the context exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Page the menu is scraped from.
    pub source_url: String,
    /// Chat channel that receives the notice.
    pub channel: String,
    /// Emit gate reports to the debug channel.
    pub debug_mode: bool,
}

/// What kind of day the scraped post describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SituationKind {
    #[default]
    Normal,
    Holiday,
    SpecialMenu,
    Error,
}

impl SituationKind {
    /// The routing label a situation maps to once its detection succeeded.
    pub fn action(&self) -> Action {
        match self {
            SituationKind::Normal => Action::Normal,
            SituationKind::Holiday => Action::HolidayNotice,
            SituationKind::SpecialMenu => Action::SpecialNotice,
            SituationKind::Error => Action::ErrorNotice,
        }
    }
}

/// Classification of the scraped post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationAnalysis {
    pub situation_type: SituationKind,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub detected_keywords: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub action_required: String,
}

/// Payloads produced and consumed by nodes.
///
/// Ownership: `raw_content` is written by the fetch node, `situation` by the
/// situation detector, `summary` by the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuData {
    pub raw_content: String,
    pub situation: Option<SituationAnalysis>,
    pub summary: String,
}

const ERROR_LOG_CAPACITY: usize = 50;

/// Error messages recorded during a run.
///
/// Only the newest messages are retained, but `total()` counts every message
/// ever pushed and never decreases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    entries: VecDeque<String>,
    total: usize,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.entries.len() == ERROR_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(message.into());
        self.total += 1;
    }

    /// Number of errors recorded in this run, including evicted ones.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// Snapshot written by a gate node on every visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub gate: String,
    pub fetch_success: bool,
    pub situation_detected: bool,
    pub summarize_success: bool,
    pub send_success: bool,
    /// Every stage guarded by this gate succeeded.
    pub all_success: bool,
    pub error_count: usize,
    pub last_run: Option<DateTime<Utc>>,
    pub details: String,
    pub error_log: Vec<String>,
    pub action: Action,
}

/// Run telemetry.
///
/// Each flag is owned by the node named after it; `final_success` is owned
/// by the terminal delivery nodes and `debug_info` by the gates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub fetch_success: bool,
    pub situation_detected: bool,
    pub summarize_success: bool,
    pub send_success: bool,
    pub holiday_notice_sent: bool,
    pub special_menu_sent: bool,
    pub final_success: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub error_log: ErrorLog,
    pub debug_info: Option<DebugReport>,
}

impl RunStatus {
    pub fn stage_ok(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.fetch_success,
            Stage::Detect => self.situation_detected,
            Stage::Summarize => self.summarize_success,
            Stage::Send => self.send_success,
        }
    }
}

/// The single structure every node reads from and writes to during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContext {
    config: RunConfig,
    pub data: MenuData,
    pub status: RunStatus,
}

impl SharedContext {
    /// Fresh context with empty payloads and all status flags cleared.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            data: MenuData::default(),
            status: RunStatus::default(),
        }
    }

    /// Fresh context with `raw_content` pre-filled, for driving the nodes
    /// downstream of fetch on their own. The fetch flag stays cleared; every
    /// workflow still starts from `new` and fetches through its source.
    pub fn with_raw_content(config: RunConfig, raw_content: impl Into<String>) -> Self {
        let mut ctx = Self::new(config);
        ctx.data.raw_content = raw_content.into();
        ctx
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}
