//! Contact and ContactChannel repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Contact, ContactChannel};

/// Repository interface for Contact persistence.
///
/// This is the only table family (alongside [`ContactChannelRepository`])
/// shared across modules; writes are restricted to the identity resolver
/// and owner bootstrap.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, contact: &Contact) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Contact>>;

    async fn update(&self, contact: &Contact) -> DomainResult<()>;

    /// The single contact carrying the `owner` role, if bootstrap has run.
    async fn get_owner(&self) -> DomainResult<Option<Contact>>;

    async fn list(&self) -> DomainResult<Vec<Contact>>;
}

/// Repository interface for ContactChannel persistence.
#[async_trait]
pub trait ContactChannelRepository: Send + Sync {
    /// Insert a channel binding. Returns `Ok(false)` without inserting if
    /// `(channel_type, channel_value)` is already bound (unique-on-conflict).
    async fn create_if_absent(&self, channel: &ContactChannel) -> DomainResult<bool>;

    async fn find_by_channel(&self, channel_type: &str, channel_value: &str) -> DomainResult<Option<ContactChannel>>;

    async fn list_for_contact(&self, contact_id: Uuid) -> DomainResult<Vec<ContactChannel>>;
}
