//! Audit endpoint: the immutable approval event stream.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::sqlite::SqliteApprovalEventRepository;
use crate::dashboard::error::ApiError;
use crate::dashboard::state::AppState;
use crate::domain::models::ApprovalEvent;
use crate::domain::ports::ApprovalEventRepository;

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub action_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct AuditList {
    pub events: Vec<ApprovalEvent>,
}

async fn audit(
    State(state): State<AppState>,
    Path(butler): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditList>, ApiError> {
    let pool = state.pool(&butler)?;
    let events_repo = SqliteApprovalEventRepository::new(pool);
    let events = match query.action_id {
        Some(action_id) => events_repo.list_for_action(action_id).await,
        None => events_repo.list_recent(query.limit.unwrap_or(100)).await,
    }
    .map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(AuditList { events }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/butlers/:butler/audit", get(audit))
}
