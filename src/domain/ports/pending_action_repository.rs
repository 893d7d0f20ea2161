//! PendingAction repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionStatus, PendingAction};

/// Filter criteria for listing pending actions (used by `list_executed` and
/// the dashboard audit surface).
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub status: Option<ActionStatus>,
    pub tool_name: Option<String>,
    pub session_id: Option<Uuid>,
    pub needs_reconciliation: Option<bool>,
}

#[async_trait]
pub trait PendingActionRepository: Send + Sync {
    async fn create(&self, action: &PendingAction) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<PendingAction>>;

    /// Compare-and-swap the status field: succeeds only if the row's current
    /// status equals `expected`. Returns `false` (no error) on mismatch so
    /// callers can re-read and react idempotently.
    async fn cas_status(
        &self,
        id: Uuid,
        expected: ActionStatus,
        new_status: ActionStatus,
        decided_by: Option<&str>,
        decided_at: Option<DateTime<Utc>>,
    ) -> DomainResult<bool>;

    /// Persist `execution_result` and transition to `Executed` in one
    /// transaction. `rule_id`, when set, additionally increments that
    /// rule's `use_count` in the same transaction.
    async fn complete_execution(
        &self,
        id: Uuid,
        result: &crate::domain::models::ExecutionResult,
    ) -> DomainResult<()>;

    /// All `pending` rows with `expires_at <= now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<PendingAction>>;

    /// All `approved` rows with no persisted `execution_result` — used at
    /// startup to flag ambiguous executions for reconciliation.
    async fn list_unreconciled(&self) -> DomainResult<Vec<PendingAction>>;

    async fn mark_needs_reconciliation(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self, filter: ActionFilter) -> DomainResult<Vec<PendingAction>>;
}
