//! SQLite adapter for ApprovalEventRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalEvent, ApprovalEventType};
use crate::domain::ports::approval_event_repository::ApprovalEventRepository;

#[derive(Clone)]
pub struct SqliteApprovalEventRepository {
    pool: SqlitePool,
}

impl SqliteApprovalEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: String,
    event_type: String,
    action_id: Option<String>,
    rule_id: Option<String>,
    actor: String,
    occurred_at: String,
    reason: Option<String>,
    payload_metadata: String,
}

fn row_to_event(row: EventRow) -> DomainResult<ApprovalEvent> {
    Ok(ApprovalEvent {
        event_id: parse_uuid(&row.event_id)?,
        event_type: ApprovalEventType::from_str(&row.event_type)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown event type: {}", row.event_type)))?,
        action_id: parse_optional_uuid(row.action_id)?,
        rule_id: parse_optional_uuid(row.rule_id)?,
        actor: row.actor,
        occurred_at: parse_datetime(&row.occurred_at)?,
        reason: row.reason,
        payload_metadata: serde_json::from_str(&row.payload_metadata)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?,
    })
}

#[async_trait]
impl ApprovalEventRepository for SqliteApprovalEventRepository {
    async fn append(&self, event: &ApprovalEvent) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO approval_events
             (event_id, event_type, action_id, rule_id, actor, occurred_at, reason, payload_metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(event.event_id.to_string())
        .bind(event.event_type.as_str())
        .bind(event.action_id.map(|u| u.to_string()))
        .bind(event.rule_id.map(|u| u.to_string()))
        .bind(&event.actor)
        .bind(event.occurred_at.to_rfc3339())
        .bind(&event.reason)
        .bind(event.payload_metadata.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_action(&self, action_id: Uuid) -> DomainResult<Vec<ApprovalEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM approval_events WHERE action_id = ? ORDER BY occurred_at ASC",
        )
        .bind(action_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_event).collect()
    }

    async fn list_for_rule(&self, rule_id: Uuid) -> DomainResult<Vec<ApprovalEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM approval_events WHERE rule_id = ? ORDER BY occurred_at ASC",
        )
        .bind(rule_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_event).collect()
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<ApprovalEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM approval_events ORDER BY occurred_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_event).collect()
    }
}
