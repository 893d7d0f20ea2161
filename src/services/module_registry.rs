//! Module registry: loads configured modules in dependency order, validates
//! the tool-naming invariants at load time, and indexes the aggregated tool
//! surface for lookup by the Executor and stdio MCP server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalDefault, ToolDescriptor};
use crate::domain::ports::module::ToolHandler;
use crate::domain::ports::{Module, ModuleRegistryLookup};

/// Central registry of loaded modules, indexed by tool name for dispatch
/// and by module name for startup/shutdown ordering.
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
    descriptors: HashMap<String, ToolDescriptor>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("tools", &self.descriptors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Dependency-order topological sort: a module's `dependencies()` must all
/// be registered before it. Returns `ConfigurationError` on an unresolvable
/// (missing or cyclic) dependency.
fn order_by_dependencies(modules: Vec<Arc<dyn Module>>) -> DomainResult<Vec<Arc<dyn Module>>> {
    let by_name: HashMap<&str, &Arc<dyn Module>> = modules.iter().map(|m| (m.name(), m)).collect();
    let mut ordered = Vec::with_capacity(modules.len());
    let mut resolved: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&Arc<dyn Module>> = modules.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|m| {
            if m.dependencies().iter().all(|dep| resolved.contains(dep)) {
                resolved.insert(m.name());
                ordered.push(Arc::clone(m));
                false
            } else {
                true
            }
        });
        if remaining.len() == before {
            let stuck: Vec<&str> = remaining.iter().map(|m| m.name()).collect();
            return Err(DomainError::ConfigurationError(format!(
                "unresolvable module dependency among: {}",
                stuck.join(", ")
            )));
        }
    }

    for module in &modules {
        for dep in module.dependencies() {
            if !by_name.contains_key(dep) {
                return Err(DomainError::ConfigurationError(format!(
                    "module '{}' depends on unregistered module '{}'",
                    module.name(),
                    dep
                )));
            }
        }
    }

    Ok(ordered)
}

impl ModuleRegistry {
    /// Load `modules` in dependency order, validating §6's naming
    /// invariants (identity prefix, exactly-one-descriptor-match) before
    /// any `on_startup` runs. Fatal `ConfigurationError` on any violation.
    pub async fn load(modules: Vec<Arc<dyn Module>>) -> DomainResult<Self> {
        let ordered = order_by_dependencies(modules)?;

        let mut descriptors = HashMap::new();
        let mut handlers = HashMap::new();

        for module in &ordered {
            let declared: HashMap<String, ToolDescriptor> =
                module.all_descriptors().into_iter().map(|d| (d.name.clone(), d)).collect();

            for (tool_name, handler) in module.register_tools() {
                let descriptor = declared.get(&tool_name).cloned().ok_or_else(|| {
                    DomainError::ConfigurationError(format!(
                        "module '{}' registered tool '{tool_name}' with no matching descriptor",
                        module.name()
                    ))
                })?;

                if descriptor.identity_prefix().is_none() {
                    return Err(DomainError::ConfigurationError(format!(
                        "tool '{tool_name}' from module '{}' lacks a user_/bot_ identity prefix",
                        module.name()
                    )));
                }

                if descriptors.contains_key(&tool_name) {
                    return Err(DomainError::ConfigurationError(format!("duplicate tool registration: '{tool_name}'")));
                }

                descriptors.insert(tool_name.clone(), descriptor);
                handlers.insert(tool_name, handler);
            }
        }

        for module in &ordered {
            module.on_startup().await?;
            info!(module = module.name(), "module started");
        }

        Ok(Self { modules: ordered, descriptors, handlers })
    }

    pub async fn shutdown(&self) {
        for module in self.modules.iter().rev() {
            if let Err(e) = module.on_shutdown().await {
                tracing::warn!(module = module.name(), error = %e, "module shutdown failed");
            }
        }
    }

    pub fn descriptor(&self, tool_name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.get(tool_name)
    }

    pub fn all_descriptors(&self) -> Vec<ToolDescriptor> {
        self.descriptors.values().cloned().collect()
    }

    /// Tool names whose effective approval posture is gated, given the
    /// operator's `[modules.approvals.gated_tools]` configuration. Tools
    /// declared `always` are gated unconditionally; `conditional` tools are
    /// gated only if configured; `none` tools are never gated regardless of
    /// configuration (a config error is raised earlier for a mismatch).
    pub fn gated_tool_names(&self, configured_gated: &HashSet<String>) -> HashSet<String> {
        self.descriptors
            .values()
            .filter(|d| match d.effective_approval_default() {
                ApprovalDefault::Always => true,
                ApprovalDefault::Conditional => configured_gated.contains(&d.name),
                ApprovalDefault::None => false,
            })
            .map(|d| d.name.clone())
            .collect()
    }

    /// Validate that every name in `gated_tools` config actually matches a
    /// registered tool, per §6's "unknown gated tool names fail config
    /// validation" rule.
    pub fn validate_gated_tool_names(&self, configured_gated: &HashSet<String>) -> DomainResult<()> {
        for name in configured_gated {
            if !self.descriptors.contains_key(name) {
                return Err(DomainError::ConfigurationError(format!("gated_tools references unknown tool '{name}'")));
            }
        }
        Ok(())
    }

    pub fn module_by_name(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }
}

impl ModuleRegistryLookup for ModuleRegistry {
    fn handler_for(&self, tool_name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(tool_name).cloned()
    }
}
