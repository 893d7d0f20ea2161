//! Inbox idempotency record for the Switchboard ingress router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A `(source_channel, source_message_id)`-unique record of an ingested
/// external event, used to deduplicate redelivered events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxRecord {
    pub id: Uuid,
    pub source_channel: String,
    pub source_message_id: String,
    pub normalized_payload: Value,
    pub ingested_at: DateTime<Utc>,
    /// Links to the worker session spawned to process this event, once known.
    pub pipeline_request_id: Option<Uuid>,
}

impl InboxRecord {
    pub fn new(source_channel: impl Into<String>, source_message_id: impl Into<String>, normalized_payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_channel: source_channel.into(),
            source_message_id: source_message_id.into(),
            normalized_payload,
            ingested_at: Utc::now(),
            pipeline_request_id: None,
        }
    }
}
