//! SQLite adapter for SessionRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Session, TriggerKind};
use crate::domain::ports::session_repository::SessionRepository;

#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    butler: String,
    trigger_kind: String,
    started_at: String,
    ended_at: Option<String>,
    input_prompt: String,
    output_summary: Option<String>,
    error: Option<String>,
    cost: Option<f64>,
}

fn row_to_session(row: SessionRow) -> DomainResult<Session> {
    Ok(Session {
        session_id: parse_uuid(&row.session_id)?,
        butler: row.butler,
        trigger_kind: TriggerKind::from_str(&row.trigger_kind)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown trigger kind: {}", row.trigger_kind)))?,
        started_at: parse_datetime(&row.started_at)?,
        ended_at: parse_optional_datetime(row.ended_at)?,
        input_prompt: row.input_prompt,
        output_summary: row.output_summary,
        error: row.error,
        cost: row.cost,
    })
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &Session) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO sessions
             (session_id, butler, trigger_kind, started_at, ended_at, input_prompt, output_summary, error, cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(session.session_id.to_string())
        .bind(&session.butler)
        .bind(session.trigger_kind.as_str())
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|d| d.to_rfc3339()))
        .bind(&session.input_prompt)
        .bind(&session.output_summary)
        .bind(&session.error)
        .bind(session.cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE session_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_session).transpose()
    }

    async fn finish(
        &self,
        id: Uuid,
        output_summary: Option<String>,
        error: Option<String>,
        cost: Option<f64>,
    ) -> DomainResult<()> {
        sqlx::query(
            "UPDATE sessions SET ended_at = ?2, output_summary = ?3, error = ?4, cost = ?5 WHERE session_id = ?1",
        )
        .bind(id.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(output_summary)
        .bind(error)
        .bind(cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as("SELECT * FROM sessions ORDER BY started_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_session).collect()
    }
}
