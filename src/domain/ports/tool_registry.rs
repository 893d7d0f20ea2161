//! Lookup seam the Executor uses to find a tool's handler without depending
//! on the concrete `ModuleRegistry` service.

use std::sync::Arc;

use crate::domain::ports::module::ToolHandler;

pub trait ModuleRegistryLookup: Send + Sync {
    fn handler_for(&self, tool_name: &str) -> Option<Arc<dyn ToolHandler>>;
}
