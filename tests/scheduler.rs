//! Integration tests for the Scheduler's tick/reconcile/CAS-acquire logic.

use std::sync::Arc;

use chrono::{Duration, Utc};

use butler::adapters::sqlite::{create_migrated_test_pool, SqliteScheduledTaskRepository};
use butler::domain::models::ScheduleSource;
use butler::domain::ports::{Clock, FixedClock};
use butler::services::Scheduler;

async fn scheduler_with_clock(clock: Arc<dyn Clock>) -> Scheduler {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let tasks = Arc::new(SqliteScheduledTaskRepository::new(pool));
    Scheduler::new(tasks, clock)
}

#[tokio::test]
async fn reconcile_toml_tasks_is_idempotent_and_disables_removed() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let scheduler = scheduler_with_clock(clock).await;

    let declared = vec![("morning-digest".to_string(), "0 0 8 * * *".to_string(), "summarize overnight inbox".to_string())];
    scheduler.reconcile_toml_tasks(&declared).await.unwrap();
    scheduler.reconcile_toml_tasks(&declared).await.unwrap();

    let tasks = scheduler.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1, "reconcile must not create duplicate rows on repeat calls");
    assert!(tasks[0].enabled);
    assert_eq!(tasks[0].source, ScheduleSource::Toml);

    // Config no longer declares the task: it must be disabled, not deleted.
    scheduler.reconcile_toml_tasks(&[]).await.unwrap();
    let tasks = scheduler.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].enabled);
}

#[tokio::test]
async fn toml_task_cannot_be_deleted_only_disabled() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let scheduler = scheduler_with_clock(clock).await;

    let declared = vec![("nightly-backup".to_string(), "0 0 2 * * *".to_string(), "run backup".to_string())];
    scheduler.reconcile_toml_tasks(&declared).await.unwrap();
    let task = scheduler.list_tasks().await.unwrap().into_iter().next().unwrap();

    let err = scheduler.delete_task(task.id).await.unwrap_err();
    assert!(matches!(err, butler::services::SchedulerError::Domain(_)));

    scheduler.set_task_enabled(task.id, false).await.unwrap();
    let task = scheduler.get_task(task.id).await.unwrap().unwrap();
    assert!(!task.enabled);
}

#[tokio::test]
async fn runtime_task_can_be_updated_and_deleted() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let scheduler = scheduler_with_clock(clock).await;

    let task = scheduler.create_task("ad-hoc", "0 */5 * * * *".to_string(), "poll for updates").await.unwrap();
    scheduler.update_task(task.id, "0 */10 * * * *".to_string(), "poll less often".to_string()).await.unwrap();

    let updated = scheduler.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(updated.cron, "0 */10 * * * *");
    assert_eq!(updated.prompt, "poll less often");

    scheduler.delete_task(task.id).await.unwrap();
    assert!(scheduler.get_task(task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_cron_is_rejected_at_creation() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let scheduler = scheduler_with_clock(clock).await;

    let err = scheduler.create_task("broken", "not a cron".to_string(), "nope").await.unwrap_err();
    assert!(matches!(err, butler::services::SchedulerError::InvalidCron(_, _)));
}

#[tokio::test]
async fn tick_fires_due_one_shot_task_exactly_once() {
    let now = Utc::now();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now - Duration::seconds(1)));
    let scheduler = scheduler_with_clock(clock).await;

    let task = scheduler.create_task("reminder", String::new(), "ping the owner").await.unwrap();
    assert!(task.is_one_shot());

    let triggers = scheduler.tick().await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].task_id, task.id);

    // A one-shot task disables itself after firing; a second tick at the
    // same instant must not re-fire it.
    let triggers_again = scheduler.tick().await.unwrap();
    assert!(triggers_again.is_empty());

    let task = scheduler.get_task(task.id).await.unwrap().unwrap();
    assert!(!task.enabled);
}

#[tokio::test]
async fn concurrent_ticks_never_double_fire_the_same_task() {
    let now = Utc::now();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now - Duration::seconds(1)));
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let tasks = Arc::new(SqliteScheduledTaskRepository::new(pool));
    let scheduler = Arc::new(Scheduler::new(tasks, clock));

    scheduler.create_task("concurrent", String::new(), "fire once").await.unwrap();

    let a = scheduler.clone();
    let b = scheduler.clone();
    let (r1, r2) = tokio::join!(tokio::spawn(async move { a.tick().await }), tokio::spawn(async move { b.tick().await }));

    let total_fired = r1.unwrap().unwrap().len() + r2.unwrap().unwrap().len();
    assert_eq!(total_fired, 1, "row-level CAS must let exactly one concurrent tick claim the task");
}
