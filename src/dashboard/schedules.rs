//! Schedules endpoints: list/create/update/toggle/delete, all routed
//! through the Scheduler service rather than raw repository writes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::sqlite::SqliteScheduledTaskRepository;
use crate::dashboard::error::ApiError;
use crate::dashboard::state::AppState;
use crate::domain::models::ScheduledTask;
use crate::domain::ports::SystemClock;
use crate::services::Scheduler;

fn scheduler_for(state: &AppState, butler: &str) -> Result<Scheduler, ApiError> {
    let pool = state.pool(butler)?;
    let tasks = Arc::new(SqliteScheduledTaskRepository::new(pool));
    Ok(Scheduler::new(tasks, Arc::new(SystemClock)))
}

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    #[serde(default)]
    pub cron: String,
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct UpdateScheduleRequest {
    pub cron: String,
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct ToggleScheduleRequest {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct ScheduleList {
    pub tasks: Vec<ScheduledTask>,
}

async fn list(State(state): State<AppState>, Path(butler): Path<String>) -> Result<Json<ScheduleList>, ApiError> {
    let scheduler = scheduler_for(&state, &butler)?;
    let tasks = scheduler.list_tasks().await.map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(ScheduleList { tasks }))
}

async fn create(
    State(state): State<AppState>,
    Path(butler): Path<String>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<Json<ScheduledTask>, ApiError> {
    let scheduler = scheduler_for(&state, &butler)?;
    if !req.cron.is_empty() {
        Scheduler::validate_cron(&req.cron).map_err(|e| ApiError::Validation(e.to_string()))?;
    }
    let task = scheduler
        .create_task(req.name, req.cron, req.prompt)
        .await
        .map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(task))
}

async fn update(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<Json<()>, ApiError> {
    let scheduler = scheduler_for(&state, &butler)?;
    if !req.cron.is_empty() {
        Scheduler::validate_cron(&req.cron).map_err(|e| ApiError::Validation(e.to_string()))?;
    }
    scheduler.update_task(id, req.cron, req.prompt).await.map_err(|e| match e {
        crate::services::SchedulerError::Domain(d) => ApiError::from(d),
        other => ApiError::Validation(other.to_string()),
    })?;
    Ok(Json(()))
}

async fn toggle(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<ToggleScheduleRequest>,
) -> Result<Json<()>, ApiError> {
    let scheduler = scheduler_for(&state, &butler)?;
    scheduler.set_task_enabled(id, req.enabled).await.map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(()))
}

async fn delete(State(state): State<AppState>, Path((butler, id)): Path<(String, Uuid)>) -> Result<Json<()>, ApiError> {
    let scheduler = scheduler_for(&state, &butler)?;
    scheduler.delete_task(id).await.map_err(|e| match e {
        crate::services::SchedulerError::Domain(d) => ApiError::from(d),
        other => ApiError::Validation(other.to_string()),
    })?;
    Ok(Json(()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/butlers/:butler/schedules", get(list).post(create))
        .route("/butlers/:butler/schedules/:id", patch(update).delete(delete))
        .route("/butlers/:butler/schedules/:id/toggle", post(toggle))
}
