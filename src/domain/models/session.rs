//! Worker session record — one row per ephemeral worker invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What triggered a worker spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Ingest,
    Schedule,
    Manual,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ingest" => Some(Self::Ingest),
            "schedule" => Some(Self::Schedule),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: Uuid,
    pub butler: String,
    pub trigger_kind: TriggerKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub input_prompt: String,
    pub output_summary: Option<String>,
    pub error: Option<String>,
    pub cost: Option<f64>,
}

impl Session {
    pub fn new(butler: impl Into<String>, trigger_kind: TriggerKind, input_prompt: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            butler: butler.into(),
            trigger_kind,
            started_at: Utc::now(),
            ended_at: None,
            input_prompt: input_prompt.into(),
            output_summary: None,
            error: None,
            cost: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}
