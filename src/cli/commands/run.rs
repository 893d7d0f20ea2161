//! Implementation of the `butler run <butler>` command: a one-shot manual
//! trigger, bypassing the scheduler and switchboard entirely.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::initialize_database;
use crate::application::Daemon;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::TriggerKind;
use crate::services::worker_spawner::SpawnRequest;
use crate::services::ButlerConfig;

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub session_id: uuid::Uuid,
    pub output_summary: Option<String>,
    pub error: Option<String>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        match (&self.output_summary, &self.error) {
            (_, Some(error)) => format!("session {} failed: {error}", self.session_id),
            (Some(summary), None) => format!("session {}:\n{summary}", self.session_id),
            (None, None) => format!("session {} produced no output", self.session_id),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(butler: &str, prompt: &str, config_dir: &Path, database_url: &str, json: bool) -> Result<()> {
    let config_path = config_dir.join(format!("{butler}.toml"));
    let config = ButlerConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration for butler '{butler}' at {}", config_path.display()))?;
    let pool = initialize_database(database_url).await.context("failed to initialize database")?;

    let daemon = Daemon::bootstrap(config, pool).await.context("failed to bootstrap butler")?;

    let outcome = daemon
        .spawner
        .spawn(SpawnRequest {
            butler: daemon.name.clone(),
            trigger_kind: TriggerKind::Manual,
            prompt: prompt.to_string(),
            identity_preamble: None,
            session_id: None,
        })
        .await
        .context("worker spawn failed")?;

    daemon.registry.shutdown().await;

    output(&RunOutput { session_id: outcome.session_id, output_summary: outcome.output_summary, error: outcome.error }, json);
    Ok(())
}
