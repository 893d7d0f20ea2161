//! Implementation of the `butler init <name>` command: scaffolds a new
//! butler's TOML configuration file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub name: String,
    pub config_path: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!("wrote {} for butler '{}'", self.config_path, self.name)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

const TEMPLATE: &str = r#"name = "{name}"
timezone = "UTC"

# routes = [
#   { channel_type = "telegram", role = "primary" },
# ]

[notifications]
max_per_minute = 5

[modules.approvals]
enabled = true
default_expiry_hours = 48
default_risk_tier = "medium"

# [modules.approvals.gated_tools]
# bot_calendar_send_invite = { risk_tier = "high", expiry_hours = 12 }

[modules.scheduler]
tasks = []
"#;

pub async fn execute(name: &str, config_dir: &Path, force: bool, json: bool) -> Result<()> {
    tokio::fs::create_dir_all(config_dir)
        .await
        .with_context(|| format!("failed to create configuration directory {}", config_dir.display()))?;

    let config_path = config_dir.join(format!("{name}.toml"));
    if config_path.exists() && !force {
        bail!("configuration for butler '{name}' already exists at {} (use --force to overwrite)", config_path.display());
    }

    let contents = TEMPLATE.replace("{name}", name);
    tokio::fs::write(&config_path, contents)
        .await
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    output(&InitOutput { name: name.to_string(), config_path: config_path.display().to_string() }, json);
    Ok(())
}
