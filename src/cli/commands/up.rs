//! Implementation of the `butler up` command: starts the long-lived daemon
//! for a single butler and runs until interrupted.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::adapters::sqlite::initialize_database;
use crate::application::Daemon;
use crate::services::ButlerConfig;

pub async fn execute(config_path: &Path, database_url: &str) -> Result<()> {
    let config = ButlerConfig::load(config_path).context("failed to load butler configuration")?;
    let pool = initialize_database(database_url).await.context("failed to initialize database")?;

    let daemon = std::sync::Arc::new(Daemon::bootstrap(config, pool).await.context("failed to bootstrap butler")?);
    info!(butler = %daemon.name, "butler daemon starting");

    let (shutdown_tx, _) = broadcast::channel(1);
    let handles = daemon.spawn_loops(&shutdown_tx);

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!(butler = %daemon.name, "shutdown signal received");
    let _ = shutdown_tx.send(());

    let _ = tokio::join!(handles.scheduler, handles.expiry_sweep, handles.notifier_flush);
    daemon.registry.shutdown().await;
    info!(butler = %daemon.name, "butler daemon stopped");
    Ok(())
}
