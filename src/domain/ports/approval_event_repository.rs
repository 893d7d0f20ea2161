//! ApprovalEvent repository port — append-only audit stream.
//!
//! Deliberately exposes no update/delete methods: the trait surface itself
//! is part of the immutability enforcement, backstopped by schema-level
//! triggers in the SQLite adapter.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ApprovalEvent;

#[async_trait]
pub trait ApprovalEventRepository: Send + Sync {
    async fn append(&self, event: &ApprovalEvent) -> DomainResult<()>;

    async fn list_for_action(&self, action_id: Uuid) -> DomainResult<Vec<ApprovalEvent>>;

    async fn list_for_rule(&self, rule_id: Uuid) -> DomainResult<Vec<ApprovalEvent>>;

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<ApprovalEvent>>;
}
