//! Module port — the inward boundary a domain module (Approvals, Calendar,
//! Contacts, Memory, …) implements to contribute tools, migrations, and
//! lifecycle hooks to a butler instance.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::ToolDescriptor;

/// Outcome of a single tool invocation, mirroring the tool invocation
/// surface's three return shapes (§6).
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Ok(Value),
    Error { error: String, error_type: String },
}

/// A single tool's execution logic, registered by a [`Module`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> DomainResult<Value>;
}

/// A self-contained feature bundle contributing tools, migrations, and
/// lifecycle hooks to the butler runtime.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique module name, e.g. `"calendar"`.
    fn name(&self) -> &str;

    /// Names of other modules this module depends on; load order honors this.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    /// Environment variable names this module requires to be present in the
    /// worker subprocess's credentials environment.
    fn credentials_env(&self) -> &[&str] {
        &[]
    }

    fn user_inputs(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    fn user_outputs(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    fn bot_inputs(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    fn bot_outputs(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    /// All descriptors this module declares, across the four lists.
    fn all_descriptors(&self) -> Vec<ToolDescriptor> {
        let mut all = self.user_inputs();
        all.extend(self.user_outputs());
        all.extend(self.bot_inputs());
        all.extend(self.bot_outputs());
        all
    }

    /// Return `(tool_name, handler)` pairs this module registers. Every
    /// returned name must match exactly one of this module's descriptors.
    fn register_tools(&self) -> Vec<(String, std::sync::Arc<dyn ToolHandler>)>;

    /// Embedded SQL migrations this module owns (empty if none).
    fn migrations(&self) -> Vec<crate::adapters::sqlite::Migration> {
        Vec::new()
    }

    async fn on_startup(&self) -> DomainResult<()> {
        Ok(())
    }

    async fn on_shutdown(&self) -> DomainResult<()> {
        Ok(())
    }

    /// Called by the Worker Spawner to build the memory-context block of
    /// the system prompt, if this is the memory module. Other modules
    /// return `None`.
    fn context(&self, _prompt: &str, _butler: &str) -> Option<String> {
        None
    }

    /// Called by the Worker Spawner after a session completes, if this is
    /// the memory module. A failure here must not block finalization —
    /// callers treat this as fail-open.
    fn store_episode(&self, _butler: &str, _session_id: uuid::Uuid, _observations: &str) -> DomainResult<()> {
        Ok(())
    }
}
