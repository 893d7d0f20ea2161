//! Timeline endpoint: recent worker sessions for a butler.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::adapters::sqlite::SqliteSessionRepository;
use crate::dashboard::error::ApiError;
use crate::dashboard::state::AppState;
use crate::domain::models::Session;
use crate::domain::ports::SessionRepository;

#[derive(Deserialize)]
pub struct TimelineQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct TimelineList {
    pub sessions: Vec<Session>,
}

async fn timeline(
    State(state): State<AppState>,
    Path(butler): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<TimelineList>, ApiError> {
    let pool = state.pool(&butler)?;
    let sessions_repo = SqliteSessionRepository::new(pool);
    let sessions = sessions_repo
        .list_recent(query.limit.unwrap_or(50))
        .await
        .map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(TimelineList { sessions }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/butlers/:butler/timeline", get(timeline))
}
