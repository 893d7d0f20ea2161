//! SQLite adapter for PendingActionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionStatus, ExecutionResult, PendingAction, RiskTier};
use crate::domain::ports::pending_action_repository::{ActionFilter, PendingActionRepository};

#[derive(Clone)]
pub struct SqlitePendingActionRepository {
    pool: SqlitePool,
}

impl SqlitePendingActionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    action_id: String,
    tool_name: String,
    tool_args: String,
    status: String,
    requested_at: String,
    expires_at: String,
    decided_by: Option<String>,
    decided_at: Option<String>,
    execution_result: Option<String>,
    rule_id: Option<String>,
    agent_summary: Option<String>,
    session_id: Option<String>,
    risk_tier: String,
    needs_reconciliation: bool,
}

fn row_to_action(row: ActionRow) -> DomainResult<PendingAction> {
    let execution_result = row
        .execution_result
        .map(|s| serde_json::from_str::<ExecutionResult>(&s))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))?;

    Ok(PendingAction {
        action_id: parse_uuid(&row.action_id)?,
        tool_name: row.tool_name,
        tool_args: serde_json::from_str(&row.tool_args).map_err(|e| DomainError::SerializationError(e.to_string()))?,
        status: ActionStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown action status: {}", row.status)))?,
        requested_at: parse_datetime(&row.requested_at)?,
        expires_at: parse_datetime(&row.expires_at)?,
        decided_by: row.decided_by,
        decided_at: parse_optional_datetime(row.decided_at)?,
        execution_result,
        rule_id: parse_optional_uuid(row.rule_id)?,
        agent_summary: row.agent_summary,
        session_id: parse_optional_uuid(row.session_id)?,
        risk_tier: RiskTier::from_str(&row.risk_tier)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown risk tier: {}", row.risk_tier)))?,
        needs_reconciliation: row.needs_reconciliation,
    })
}

#[async_trait]
impl PendingActionRepository for SqlitePendingActionRepository {
    async fn create(&self, action: &PendingAction) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO pending_actions
             (action_id, tool_name, tool_args, status, requested_at, expires_at,
              decided_by, decided_at, execution_result, rule_id, agent_summary,
              session_id, risk_tier, needs_reconciliation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(action.action_id.to_string())
        .bind(&action.tool_name)
        .bind(action.tool_args.to_string())
        .bind(action.status.as_str())
        .bind(action.requested_at.to_rfc3339())
        .bind(action.expires_at.to_rfc3339())
        .bind(&action.decided_by)
        .bind(action.decided_at.map(|d| d.to_rfc3339()))
        .bind(action.execution_result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(action.rule_id.map(|u| u.to_string()))
        .bind(&action.agent_summary)
        .bind(action.session_id.map(|u| u.to_string()))
        .bind(action.risk_tier.as_str())
        .bind(action.needs_reconciliation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<PendingAction>> {
        let row: Option<ActionRow> = sqlx::query_as("SELECT * FROM pending_actions WHERE action_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_action).transpose()
    }

    async fn cas_status(
        &self,
        id: Uuid,
        expected: ActionStatus,
        new_status: ActionStatus,
        decided_by: Option<&str>,
        decided_at: Option<DateTime<Utc>>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE pending_actions
             SET status = ?3, decided_by = COALESCE(?4, decided_by), decided_at = COALESCE(?5, decided_at)
             WHERE action_id = ?1 AND status = ?2",
        )
        .bind(id.to_string())
        .bind(expected.as_str())
        .bind(new_status.as_str())
        .bind(decided_by)
        .bind(decided_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_execution(&self, id: Uuid, result: &ExecutionResult) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let update_result = sqlx::query(
            "UPDATE pending_actions SET status = 'executed', execution_result = ?2
             WHERE action_id = ?1 AND status = 'approved'",
        )
        .bind(id.to_string())
        .bind(serde_json::to_string(result)?)
        .execute(&mut *tx)
        .await?;

        if update_result.rows_affected() == 0 {
            return Err(DomainError::ConcurrencyConflict { entity: "pending_action".to_string(), id });
        }

        let rule_id: Option<String> = sqlx::query_scalar("SELECT rule_id FROM pending_actions WHERE action_id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await?;

        if let Some(rule_id) = rule_id {
            sqlx::query("UPDATE approval_rules SET use_count = use_count + 1 WHERE rule_id = ?")
                .bind(&rule_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<PendingAction>> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            "SELECT * FROM pending_actions WHERE status = 'pending' AND expires_at <= ? ORDER BY expires_at ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn list_unreconciled(&self) -> DomainResult<Vec<PendingAction>> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            "SELECT * FROM pending_actions WHERE status = 'approved' AND execution_result IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn mark_needs_reconciliation(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE pending_actions SET needs_reconciliation = 1 WHERE action_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: ActionFilter) -> DomainResult<Vec<PendingAction>> {
        let mut query = String::from("SELECT * FROM pending_actions WHERE 1 = 1");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.tool_name.is_some() {
            query.push_str(" AND tool_name = ?");
        }
        if filter.session_id.is_some() {
            query.push_str(" AND session_id = ?");
        }
        if filter.needs_reconciliation.is_some() {
            query.push_str(" AND needs_reconciliation = ?");
        }
        query.push_str(" ORDER BY requested_at DESC");

        let mut q = sqlx::query_as::<_, ActionRow>(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(tool_name) = &filter.tool_name {
            q = q.bind(tool_name);
        }
        if let Some(session_id) = filter.session_id {
            q = q.bind(session_id.to_string());
        }
        if let Some(needs) = filter.needs_reconciliation {
            q = q.bind(needs);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_action).collect()
    }
}
