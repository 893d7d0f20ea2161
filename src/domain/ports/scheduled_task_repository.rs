//! ScheduledTask repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ScheduleRunResult, ScheduledTask};

#[async_trait]
pub trait ScheduledTaskRepository: Send + Sync {
    async fn create(&self, task: &ScheduledTask) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ScheduledTask>>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<ScheduledTask>>;

    async fn list(&self) -> DomainResult<Vec<ScheduledTask>>;

    async fn list_enabled(&self) -> DomainResult<Vec<ScheduledTask>>;

    /// CAS-acquire a tick: succeeds (returns `true`) only if `next_run_at`
    /// is still `<= now` at write time, atomically setting `last_run_at`.
    /// This is the row-level lock described in the Scheduler's tick
    /// procedure — the losing tick of a race gets `false` and skips.
    async fn try_acquire_tick(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<bool>;

    async fn record_run_result(
        &self,
        id: Uuid,
        result: ScheduleRunResult,
        next_run_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()>;

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn update_prompt(&self, id: Uuid, cron: String, prompt: String) -> DomainResult<()>;
}
