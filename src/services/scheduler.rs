//! Scheduler: maintains `ScheduledTask` rows and fires worker triggers on
//! a single tick loop.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule as CronSchedule;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{ScheduleRunResult, ScheduleSource, ScheduledTask};
use crate::domain::ports::{Clock, ScheduledTaskRepository};

const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// A fired trigger the scheduler hands to the Worker Spawner.
#[derive(Debug, Clone)]
pub struct ScheduleTrigger {
    pub task_id: Uuid,
    pub prompt: String,
}

pub struct Scheduler {
    tasks: Arc<dyn ScheduledTaskRepository>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(tasks: Arc<dyn ScheduledTaskRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, clock, tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS) }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    fn next_fire_after(cron_expr: &str, after: chrono::DateTime<Utc>) -> SchedulerResult<Option<chrono::DateTime<Utc>>> {
        let schedule = CronSchedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron(cron_expr.to_string(), e.to_string()))?;
        Ok(schedule.after(&after).next())
    }

    /// Validate a cron expression at declaration time (config load or
    /// runtime task creation).
    pub fn validate_cron(cron_expr: &str) -> SchedulerResult<()> {
        CronSchedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron(cron_expr.to_string(), e.to_string()))?;
        Ok(())
    }

    /// Create a runtime-declared task, computing its first `next_run_at`.
    pub async fn create_task(&self, name: impl Into<String>, cron: String, prompt: impl Into<String>) -> SchedulerResult<ScheduledTask> {
        let now = self.clock.now();
        let next_run_at = if cron.is_empty() { Some(now) } else { Self::next_fire_after(&cron, now)? };

        let task = ScheduledTask {
            id: Uuid::new_v4(),
            name: name.into(),
            cron,
            start_at: None,
            prompt: prompt.into(),
            source: ScheduleSource::Runtime,
            enabled: true,
            last_run_at: None,
            last_result: None,
            next_run_at,
            created_at: now,
        };
        self.tasks.create(&task).await?;
        Ok(task)
    }

    /// Reconcile `toml`-declared tasks at boot: create-if-missing,
    /// disable-if-removed-from-config, never delete.
    pub async fn reconcile_toml_tasks(&self, declared: &[(String, String, String)]) -> SchedulerResult<()> {
        let existing = self.tasks.list().await?;
        let now = self.clock.now();

        for (name, cron, prompt) in declared {
            if let Some(task) = existing.iter().find(|t| &t.name == name && t.source == ScheduleSource::Toml) {
                if &task.cron != cron || &task.prompt != prompt {
                    self.tasks.update_prompt(task.id, cron.clone(), prompt.clone()).await?;
                }
                if !task.enabled {
                    self.tasks.set_enabled(task.id, true).await?;
                }
                continue;
            }

            let next_run_at = if cron.is_empty() { Some(now) } else { Self::next_fire_after(cron, now)? };
            let task = ScheduledTask {
                id: Uuid::new_v4(),
                name: name.clone(),
                cron: cron.clone(),
                start_at: None,
                prompt: prompt.clone(),
                source: ScheduleSource::Toml,
                enabled: true,
                last_run_at: None,
                last_result: None,
                next_run_at,
                created_at: now,
            };
            self.tasks.create(&task).await?;
        }

        let declared_names: std::collections::HashSet<&str> = declared.iter().map(|(n, _, _)| n.as_str()).collect();
        for task in existing.into_iter().filter(|t| t.source == ScheduleSource::Toml) {
            if !declared_names.contains(task.name.as_str()) && task.enabled {
                self.tasks.set_enabled(task.id, false).await?;
            }
        }
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> SchedulerResult<Option<ScheduledTask>> {
        Ok(self.tasks.get(id).await?)
    }

    pub async fn list_tasks(&self) -> SchedulerResult<Vec<ScheduledTask>> {
        Ok(self.tasks.list().await?)
    }

    /// Toggle a task's `enabled` flag. Both sources may be disabled; the
    /// `toml`-source delete restriction lives in [`Self::delete_task`], not here.
    pub async fn set_task_enabled(&self, id: Uuid, enabled: bool) -> SchedulerResult<()> {
        self.tasks.set_enabled(id, enabled).await?;
        Ok(())
    }

    /// Update a `runtime`-source task's cron/prompt, recomputing `next_run_at`.
    pub async fn update_task(&self, id: Uuid, cron: String, prompt: String) -> SchedulerResult<()> {
        let now = self.clock.now();
        if !cron.is_empty() {
            Self::next_fire_after(&cron, now)?;
        }
        self.tasks.update_prompt(id, cron, prompt).await?;
        Ok(())
    }

    /// Delete a `runtime`-source task. `toml`-source tasks can only be
    /// disabled, per the scheduled-task invariant; attempting to delete one
    /// is a configuration error.
    pub async fn delete_task(&self, id: Uuid) -> SchedulerResult<()> {
        let task = self.tasks.get(id).await?.ok_or(DomainError::ScheduledTaskNotFound(id))?;
        if task.source == ScheduleSource::Toml {
            return Err(DomainError::ValidationFailed(format!("task '{}' is toml-declared and can only be disabled", task.name)).into());
        }
        self.tasks.delete(id).await?;
        Ok(())
    }

    /// One tick: CAS-acquire due tasks and return the triggers to fire.
    /// Losers of the row-level lock (a concurrent tick, or a still-running
    /// prior fire) are silently skipped, never queued.
    pub async fn tick(&self) -> SchedulerResult<Vec<ScheduleTrigger>> {
        let now = self.clock.now();
        let due = self.tasks.list_enabled().await?.into_iter().filter(|t| t.is_due(now));
        let mut triggers = Vec::new();

        for task in due {
            if !self.tasks.try_acquire_tick(task.id, now).await? {
                continue;
            }

            triggers.push(ScheduleTrigger { task_id: task.id, prompt: task.prompt.clone() });

            if task.is_one_shot() {
                self.tasks.set_enabled(task.id, false).await?;
                self.tasks.record_run_result(task.id, ScheduleRunResult { succeeded: true, error: None }, None).await?;
                continue;
            }

            match Self::next_fire_after(&task.cron, now) {
                Ok(next) => {
                    self.tasks.record_run_result(task.id, ScheduleRunResult { succeeded: true, error: None }, next).await?;
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "failed to compute next cron fire, disabling task");
                    self.tasks.set_enabled(task.id, false).await?;
                    self.tasks
                        .record_run_result(task.id, ScheduleRunResult { succeeded: false, error: Some(e.to_string()) }, None)
                        .await?;
                }
            }
        }

        Ok(triggers)
    }

    /// Run the tick loop until `shutdown` fires, invoking `on_trigger` for
    /// each fired task.
    pub async fn run<F, Fut>(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>, on_trigger: F)
    where
        F: Fn(ScheduleTrigger) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(triggers) => {
                            for trigger in triggers {
                                on_trigger(trigger).await;
                            }
                        }
                        Err(e) => warn!(error = %e, "scheduler tick failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("scheduler tick loop shutting down");
                    break;
                }
            }
        }
    }
}
