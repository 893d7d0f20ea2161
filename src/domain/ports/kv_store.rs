//! Opaque key/value store port used for one-shot flags and scheduler state.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> DomainResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> DomainResult<()>;

    /// Set the key only if absent. Returns `true` if this call set it.
    async fn set_if_absent(&self, key: &str, value: &str) -> DomainResult<bool>;
}
