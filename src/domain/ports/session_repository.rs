//! Session repository port — one row per worker invocation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Session;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Session>>;

    async fn finish(
        &self,
        id: Uuid,
        output_summary: Option<String>,
        error: Option<String>,
        cost: Option<f64>,
    ) -> DomainResult<()>;

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Session>>;
}
