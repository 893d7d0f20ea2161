//! SQLite adapter for ApprovalRuleRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalRule, ArgConstraint, RiskTier};
use crate::domain::ports::approval_rule_repository::ApprovalRuleRepository;

#[derive(Clone)]
pub struct SqliteApprovalRuleRepository {
    pool: SqlitePool,
}

impl SqliteApprovalRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_id: String,
    tool_name: String,
    arg_constraints: String,
    description: String,
    created_at: String,
    active: bool,
    expires_at: Option<String>,
    max_uses: Option<i64>,
    use_count: i64,
    risk_tier: String,
    created_from_action_id: Option<String>,
}

fn row_to_rule(row: RuleRow) -> DomainResult<ApprovalRule> {
    let arg_constraints: HashMap<String, ArgConstraint> = serde_json::from_str(&row.arg_constraints)
        .map_err(|e| DomainError::SerializationError(e.to_string()))?;

    Ok(ApprovalRule {
        rule_id: parse_uuid(&row.rule_id)?,
        tool_name: row.tool_name,
        arg_constraints,
        description: row.description,
        created_at: parse_datetime(&row.created_at)?,
        active: row.active,
        expires_at: parse_optional_datetime(row.expires_at)?,
        max_uses: row.max_uses.map(|v| v as u64),
        use_count: row.use_count as u64,
        risk_tier: RiskTier::from_str(&row.risk_tier)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown risk tier: {}", row.risk_tier)))?,
        created_from_action_id: parse_optional_uuid(row.created_from_action_id)?,
    })
}

#[async_trait]
impl ApprovalRuleRepository for SqliteApprovalRuleRepository {
    async fn create(&self, rule: &ApprovalRule) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO approval_rules
             (rule_id, tool_name, arg_constraints, description, created_at, active,
              expires_at, max_uses, use_count, risk_tier, created_from_action_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(rule.rule_id.to_string())
        .bind(&rule.tool_name)
        .bind(serde_json::to_string(&rule.arg_constraints)?)
        .bind(&rule.description)
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.active)
        .bind(rule.expires_at.map(|d| d.to_rfc3339()))
        .bind(rule.max_uses.map(|v| v as i64))
        .bind(rule.use_count as i64)
        .bind(rule.risk_tier.as_str())
        .bind(rule.created_from_action_id.map(|u| u.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalRule>> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM approval_rules WHERE rule_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_rule).transpose()
    }

    async fn candidates_for_tool(&self, tool_name: &str, now: DateTime<Utc>) -> DomainResult<Vec<ApprovalRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT * FROM approval_rules
             WHERE tool_name = ?1 AND active = 1
               AND (expires_at IS NULL OR expires_at > ?2)
               AND (max_uses IS NULL OR use_count < max_uses)",
        )
        .bind(tool_name)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_rule).collect()
    }

    async fn increment_use_count(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE approval_rules SET use_count = use_count + 1 WHERE rule_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()> {
        sqlx::query("UPDATE approval_rules SET active = ? WHERE rule_id = ?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<ApprovalRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT * FROM approval_rules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_rule).collect()
    }
}
