//! Scheduled task domain model for the cron / one-shot trigger engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a `ScheduledTask` was declared from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleSource {
    /// Declared in the butler's TOML configuration. Can be disabled but
    /// never deleted.
    Toml,
    /// Created at runtime by the operator via the task-management tool surface.
    Runtime,
}

impl ScheduleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Runtime => "runtime",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "toml" => Some(Self::Toml),
            "runtime" => Some(Self::Runtime),
            _ => None,
        }
    }
}

/// Result of the most recent fire of a scheduled task, recorded for the
/// dashboard's failure-summary view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRunResult {
    pub succeeded: bool,
    pub error: Option<String>,
}

/// A cron- or one-shot-backed task that spawns a worker at a defined time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledTask {
    pub id: uuid::Uuid,
    pub name: String,
    /// 5-field cron expression, or empty for a one-shot task.
    pub cron: String,
    /// One-shot fire time. `None` for cron tasks.
    pub start_at: Option<DateTime<Utc>>,
    pub prompt: String,
    pub source: ScheduleSource,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<ScheduleRunResult>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn is_one_shot(&self) -> bool {
        self.cron.is_empty()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|t| t <= now)
    }
}
