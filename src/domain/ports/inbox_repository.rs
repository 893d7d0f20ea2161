//! InboxRecord repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::InboxRecord;

#[async_trait]
pub trait InboxRepository: Send + Sync {
    /// Insert the record if `(source_channel, source_message_id)` has not
    /// been seen before. Returns `true` if this call performed the insert,
    /// `false` if it was already present (duplicate delivery — drop).
    async fn insert_if_absent(&self, record: &InboxRecord) -> DomainResult<bool>;

    async fn link_session(&self, id: Uuid, session_id: Uuid) -> DomainResult<()>;
}
