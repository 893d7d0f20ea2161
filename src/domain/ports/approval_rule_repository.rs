//! ApprovalRule repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ApprovalRule;

#[async_trait]
pub trait ApprovalRuleRepository: Send + Sync {
    async fn create(&self, rule: &ApprovalRule) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalRule>>;

    /// All usable candidate rules for a tool at `now`: `active`, not expired,
    /// not at `max_uses`. Specificity/precedence ordering is applied by the
    /// caller (the gate), not the repository.
    async fn candidates_for_tool(&self, tool_name: &str, now: DateTime<Utc>) -> DomainResult<Vec<ApprovalRule>>;

    /// Atomically increment `use_count` for the winning rule of an
    /// auto-approval. Part of the same transaction as the action's status
    /// transition at the call site.
    async fn increment_use_count(&self, id: Uuid) -> DomainResult<()>;

    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<ApprovalRule>>;
}
