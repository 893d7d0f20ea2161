//! Opaque key/value state used by schedulers and one-shot flags, e.g.
//! `identity:unknown_notified:{type}:{value}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
