//! SQLite adapter for InboxRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::InboxRecord;
use crate::domain::ports::inbox_repository::InboxRepository;

#[derive(Clone)]
pub struct SqliteInboxRepository {
    pool: SqlitePool,
}

impl SqliteInboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxRepository for SqliteInboxRepository {
    async fn insert_if_absent(&self, record: &InboxRecord) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO inbox_records
             (id, source_channel, source_message_id, normalized_payload, ingested_at, pipeline_request_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(record.id.to_string())
        .bind(&record.source_channel)
        .bind(&record.source_message_id)
        .bind(record.normalized_payload.to_string())
        .bind(record.ingested_at.to_rfc3339())
        .bind(record.pipeline_request_id.map(|u| u.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_session(&self, id: Uuid, session_id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE inbox_records SET pipeline_request_id = ? WHERE id = ?")
            .bind(session_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
