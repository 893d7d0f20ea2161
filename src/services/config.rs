//! Per-butler TOML configuration, layered defaults → file → environment,
//! per §6: top-level butler fields, `[modules.<module>]` blocks,
//! `[modules.approvals]`, and `[modules.scheduler]`.

use std::collections::HashMap;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::models::RiskTier;
use crate::services::approval_gate::GatedToolPolicy;
use crate::services::module_registry::ModuleRegistry;
use crate::services::scheduler::Scheduler;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_enabled() -> bool {
    true
}

fn default_expiry_hours() -> i64 {
    48
}

fn default_risk_tier() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatedToolConfig {
    pub expiry_hours: Option<i64>,
    pub risk_tier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_expiry_hours")]
    pub default_expiry_hours: i64,
    #[serde(default = "default_risk_tier")]
    pub default_risk_tier: String,
    #[serde(default)]
    pub gated_tools: HashMap<String, GatedToolConfig>,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_expiry_hours: default_expiry_hours(),
            default_risk_tier: default_risk_tier(),
            gated_tools: HashMap::new(),
        }
    }
}

impl ApprovalsConfig {
    /// Resolve each configured gated tool to the `GatedToolPolicy` shape the
    /// gate consumes, validating cron-adjacent risk-tier strings eagerly.
    pub fn gated_tool_policies(&self) -> ConfigResult<HashMap<String, GatedToolPolicy>> {
        self.gated_tools
            .iter()
            .map(|(name, cfg)| {
                let risk_tier = cfg
                    .risk_tier
                    .as_deref()
                    .map(|s| {
                        RiskTier::from_str(s)
                            .ok_or_else(|| ConfigError::Load(format!("gated tool '{name}' has invalid risk_tier '{s}'")))
                    })
                    .transpose()?;
                Ok((name.clone(), GatedToolPolicy { expiry_hours: cfg.expiry_hours, risk_tier }))
            })
            .collect()
    }

    pub fn default_risk_tier(&self) -> ConfigResult<RiskTier> {
        RiskTier::from_str(&self.default_risk_tier)
            .ok_or_else(|| ConfigError::Load(format!("invalid default_risk_tier '{}'", self.default_risk_tier)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTaskConfig {
    pub name: String,
    /// 5-field cron expression, or empty for a one-shot task.
    #[serde(default)]
    pub cron: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub tasks: Vec<StaticTaskConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Passthrough per-module blocks (`[modules.calendar]`, …) handed to
    /// each module's own config parsing; the registry's concern, not ours.
    #[serde(flatten)]
    pub other: HashMap<String, toml::Value>,
}

/// One `(channel_type, role)` pair this butler claims inbound events for;
/// the Switchboard's static routing table is the union of every loaded
/// butler's declared routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub channel_type: String,
    pub role: String,
}

fn default_max_per_minute() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { max_per_minute: default_max_per_minute() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButlerConfig {
    pub name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ButlerConfig {
    fn default() -> Self {
        Self {
            name: "butler".to_string(),
            timezone: default_timezone(),
            routes: Vec::new(),
            notifications: NotificationsConfig::default(),
            modules: ModulesConfig::default(),
        }
    }
}

impl ButlerConfig {
    /// Load defaults ⊕ the TOML file at `path` ⊕ `BUTLER_`-prefixed env
    /// overrides (`__`-separated for nesting, e.g. `BUTLER_MODULES__APPROVALS__ENABLED`).
    pub fn load(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        Figment::new()
            .merge(Serialized::defaults(ButlerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BUTLER_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate every `[modules.approvals.gated_tools]` name against the
    /// registry's actual tool surface. Must run after the registry has
    /// finished loading modules.
    pub fn validate_against_registry(&self, registry: &ModuleRegistry) -> ConfigResult<()> {
        let names: std::collections::HashSet<String> = self.modules.approvals.gated_tools.keys().cloned().collect();
        registry.validate_gated_tool_names(&names)?;
        for task in &self.modules.scheduler.tasks {
            if !task.cron.is_empty() {
                Scheduler::validate_cron(&task.cron).map_err(|e| ConfigError::Load(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn static_tasks(&self) -> Vec<(String, String, String)> {
        self.modules.scheduler.tasks.iter().map(|t| (t.name.clone(), t.cron.clone(), t.prompt.clone())).collect()
    }
}
