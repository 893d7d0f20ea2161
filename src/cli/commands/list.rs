//! Implementation of the `butler list` command: enumerates every butler
//! configuration file in a directory.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::services::ButlerConfig;

#[derive(Debug, Serialize)]
pub struct ButlerSummary {
    pub name: String,
    pub timezone: String,
    pub approvals_enabled: bool,
    pub static_task_count: usize,
    pub config_path: String,
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub butlers: Vec<ButlerSummary>,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.butlers.is_empty() {
            return "no butlers configured".to_string();
        }
        self.butlers
            .iter()
            .map(|b| format!("{} ({}) -- approvals={} tasks={} [{}]", b.name, b.timezone, b.approvals_enabled, b.static_task_count, b.config_path))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config_dir: &Path, json: bool) -> Result<()> {
    let mut butlers = Vec::new();

    let mut entries = tokio::fs::read_dir(config_dir)
        .await
        .with_context(|| format!("failed to read configuration directory {}", config_dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("toml") {
            continue;
        }

        match ButlerConfig::load(&path) {
            Ok(config) => butlers.push(ButlerSummary {
                name: config.name,
                timezone: config.timezone,
                approvals_enabled: config.modules.approvals.enabled,
                static_task_count: config.modules.scheduler.tasks.len(),
                config_path: path.display().to_string(),
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unparsable butler configuration");
            }
        }
    }

    butlers.sort_by(|a, b| a.name.cmp(&b.name));
    output(&ListOutput { butlers }, json);
    Ok(())
}
