//! Read-mostly Dashboard API: a JSON-over-HTTP surface aggregating across
//! every butler database found under a configured root. Mutating
//! endpoints never write SQL directly — they route through the Scheduler
//! and Approval Gate services, the same surfaces a worker's MCP tool
//! calls use.

pub mod approvals;
pub mod audit;
pub mod error;
pub mod schedules;
pub mod state;
pub mod timeline;

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use state::AppState;

async fn list_butlers(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Vec<String>> {
    Json(state.names())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/butlers", get(list_butlers))
        .merge(schedules::router())
        .merge(approvals::router())
        .merge(timeline::router())
        .merge(audit::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Discover every butler database under `database_dir` and serve the
/// dashboard API on `host:port` until interrupted.
pub async fn serve(host: &str, port: u16, database_dir: &str) -> anyhow::Result<()> {
    let state = AppState::discover(database_dir).await?;
    info!(butlers = ?state.names(), "dashboard discovered butlers");

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dashboard API listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
