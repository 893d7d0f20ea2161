//! SQLite adapter for ScheduledTaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ScheduleRunResult, ScheduleSource, ScheduledTask};
use crate::domain::ports::scheduled_task_repository::ScheduledTaskRepository;

#[derive(Clone)]
pub struct SqliteScheduledTaskRepository {
    pool: SqlitePool,
}

impl SqliteScheduledTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    cron: String,
    start_at: Option<String>,
    prompt: String,
    source: String,
    enabled: bool,
    last_run_at: Option<String>,
    last_result: Option<String>,
    next_run_at: Option<String>,
    created_at: String,
    #[allow(dead_code)]
    lock_version: i64,
}

fn row_to_task(row: TaskRow) -> DomainResult<ScheduledTask> {
    let last_result = row
        .last_result
        .map(|s| serde_json::from_str::<ScheduleRunResult>(&s))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))?;

    Ok(ScheduledTask {
        id: parse_uuid(&row.id)?,
        name: row.name,
        cron: row.cron,
        start_at: parse_optional_datetime(row.start_at)?,
        prompt: row.prompt,
        source: ScheduleSource::from_str(&row.source)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown schedule source: {}", row.source)))?,
        enabled: row.enabled,
        last_run_at: parse_optional_datetime(row.last_run_at)?,
        last_result,
        next_run_at: parse_optional_datetime(row.next_run_at)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ScheduledTaskRepository for SqliteScheduledTaskRepository {
    async fn create(&self, task: &ScheduledTask) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_tasks
             (id, name, cron, start_at, prompt, source, enabled, last_run_at,
              last_result, next_run_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.cron)
        .bind(task.start_at.map(|d| d.to_rfc3339()))
        .bind(&task.prompt)
        .bind(task.source.as_str())
        .bind(task.enabled)
        .bind(task.last_run_at.map(|d| d.to_rfc3339()))
        .bind(task.last_result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(task.next_run_at.map(|d| d.to_rfc3339()))
        .bind(task.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ScheduledTask>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM scheduled_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_task).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<ScheduledTask>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM scheduled_tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_task).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM scheduled_tasks ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_enabled(&self) -> DomainResult<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM scheduled_tasks WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn try_acquire_tick(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<bool> {
        // Clearing next_run_at as part of the same CAS is what makes this a
        // real claim: a concurrent acquire attempt for the same task no
        // longer matches `next_run_at <= now` once the first winner commits.
        // The caller repopulates it via record_run_result once it knows the
        // task's next fire time (or leaves it null for a one-shot).
        let result = sqlx::query(
            "UPDATE scheduled_tasks
             SET last_run_at = ?2, next_run_at = NULL, lock_version = lock_version + 1
             WHERE id = ?1 AND enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?2",
        )
        .bind(id.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_run_result(
        &self,
        id: Uuid,
        result: ScheduleRunResult,
        next_run_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        sqlx::query("UPDATE scheduled_tasks SET last_result = ?2, next_run_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(serde_json::to_string(&result)?)
            .bind(next_run_at.map(|d| d.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> DomainResult<()> {
        sqlx::query("UPDATE scheduled_tasks SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM scheduled_tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_prompt(&self, id: Uuid, cron: String, prompt: String) -> DomainResult<()> {
        sqlx::query("UPDATE scheduled_tasks SET cron = ?2, prompt = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(cron)
            .bind(prompt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
