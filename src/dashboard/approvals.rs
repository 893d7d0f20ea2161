//! Approvals endpoints: the pending-approval queue, decisions, and rule
//! management — each routed through `ApprovalGate`, never a direct write
//! to the pending-action or rule tables.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::sqlite::{
    SqliteApprovalEventRepository, SqliteApprovalRuleRepository, SqliteContactChannelRepository,
    SqliteContactRepository, SqlitePendingActionRepository,
};
use crate::dashboard::error::ApiError;
use crate::dashboard::state::AppState;
use crate::domain::models::{ActionStatus, ApprovalRule, PendingAction, RiskTier};
use crate::domain::ports::{ActionFilter, ModuleRegistryLookup, SystemClock};
use crate::services::redaction::redact_args;
use crate::services::{ApprovalGate, Executor, ModuleRegistry};

/// A read-mostly `ApprovalGate`: the dashboard only ever drives the
/// approve/reject/rule surface, never `dispatch`. It still builds a real
/// (module-less) Executor so that `approve()` can run its post-approval
/// execution step; without modules loaded in this process, execution falls
/// back to the no-op/null result path for any tool with no handler here.
async fn gate_for(state: &AppState, butler: &str) -> Result<ApprovalGate, ApiError> {
    let pool = state.pool(butler)?;
    let actions = Arc::new(SqlitePendingActionRepository::new(pool.clone()));
    let events = Arc::new(SqliteApprovalEventRepository::new(pool.clone()));

    let registry = ModuleRegistry::load(Vec::new()).await.map_err(ApiError::from)?;
    let registry_lookup: Arc<dyn ModuleRegistryLookup> = Arc::new(registry);
    let executor = Arc::new(Executor::new(actions.clone(), events.clone(), registry_lookup));

    Ok(ApprovalGate::new(
        actions,
        Arc::new(SqliteApprovalRuleRepository::new(pool.clone())),
        events,
        Arc::new(SqliteContactRepository::new(pool.clone())),
        Arc::new(SqliteContactChannelRepository::new(pool)),
        Arc::new(SystemClock),
        std::collections::HashMap::new(),
        48,
        RiskTier::Medium,
        executor,
    ))
}

#[derive(Deserialize)]
pub struct QueueQuery {
    pub status: Option<String>,
    pub tool_name: Option<String>,
    pub needs_reconciliation: Option<bool>,
}

#[derive(Serialize)]
pub struct ActionList {
    pub actions: Vec<PendingAction>,
}

async fn queue(
    State(state): State<AppState>,
    Path(butler): Path<String>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<ActionList>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    let status = query.status.as_deref().and_then(ActionStatus::from_str);
    let filter = ActionFilter { status, tool_name: query.tool_name, session_id: None, needs_reconciliation: query.needs_reconciliation };
    let actions = gate.list_executed(filter).await.map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    let actions = actions
        .into_iter()
        .map(|mut a| {
            a.tool_args = redact_args(&a.tool_args);
            a
        })
        .collect();
    Ok(Json(ActionList { actions }))
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub actor: String,
    pub reason: Option<String>,
}

async fn approve(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<ActionStatus>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    let status = gate.approve(id, &req.actor, req.reason).await.map_err(map_gate_error(&butler))?;
    Ok(Json(status))
}

async fn reject(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<ActionStatus>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    let status = gate.reject(id, &req.actor, req.reason).await.map_err(map_gate_error(&butler))?;
    Ok(Json(status))
}

#[derive(Serialize)]
pub struct RuleList {
    pub rules: Vec<ApprovalRule>,
}

async fn list_rules(State(state): State<AppState>, Path(butler): Path<String>) -> Result<Json<RuleList>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    let rules = gate.list_rules().await.map_err(|e| ApiError::ButlerUnreachable(butler, e.to_string()))?;
    Ok(Json(RuleList { rules }))
}

#[derive(Deserialize)]
pub struct CreateRuleFromActionRequest {
    pub actor: String,
}

async fn create_rule_from_action(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<CreateRuleFromActionRequest>,
) -> Result<Json<ApprovalRule>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    let rule = gate.create_rule_from_action(id, &req.actor).await.map_err(map_gate_error(&butler))?;
    Ok(Json(rule))
}

#[derive(Deserialize)]
pub struct RevokeRuleRequest {
    pub actor: String,
}

async fn revoke_rule(
    State(state): State<AppState>,
    Path((butler, id)): Path<(String, Uuid)>,
    Json(req): Json<RevokeRuleRequest>,
) -> Result<Json<()>, ApiError> {
    let gate = gate_for(&state, &butler).await?;
    gate.revoke_rule(id, &req.actor).await.map_err(map_gate_error(&butler))?;
    Ok(Json(()))
}

fn map_gate_error(butler: &str) -> impl Fn(crate::services::GateError) -> ApiError + '_ {
    move |e| match e {
        crate::services::GateError::Domain(d) => ApiError::from(d),
        other => ApiError::Validation(other.to_string()),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/butlers/:butler/approvals", get(queue))
        .route("/butlers/:butler/approvals/:id/approve", post(approve))
        .route("/butlers/:butler/approvals/:id/reject", post(reject))
        .route("/butlers/:butler/approvals/:id/rules", post(create_rule_from_action))
        .route("/butlers/:butler/rules", get(list_rules))
        .route("/butlers/:butler/rules/:id/revoke", post(revoke_rule))
}
