//! Module interface descriptors — the inward boundary documented in §6.
//!
//! A `Module` (see [`crate::domain::ports::module::Module`]) declares its
//! tool surface as data, not reflection: four descriptor lists
//! (`user_inputs`, `user_outputs`, `bot_inputs`, `bot_outputs`), each
//! carrying one [`ToolDescriptor`] per registered tool.

use serde::{Deserialize, Serialize};

/// Default approval posture for a tool, as declared by its owning module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDefault {
    /// Never gated.
    None,
    /// Gated only if the butler's config lists this tool under
    /// `[modules.approvals.gated_tools]`.
    Conditional,
    /// Always gated, regardless of configuration.
    Always,
}

/// A single tool's identity and default approval posture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub approval_default: ApprovalDefault,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, approval_default: ApprovalDefault) -> Self {
        Self { name: name.into(), description: description.into(), approval_default }
    }

    /// Identity prefix required of every registered tool name (`user_` or `bot_`).
    pub fn identity_prefix(&self) -> Option<&'static str> {
        if self.name.starts_with("user_") {
            Some("user_")
        } else if self.name.starts_with("bot_") {
            Some("bot_")
        } else {
            None
        }
    }

    /// Safety-net heuristic: `user_*_send*` / `user_*_reply*` are always
    /// gated even if the module declared a weaker default.
    pub fn effective_approval_default(&self) -> ApprovalDefault {
        let name = &self.name;
        if name.starts_with("user_") && (name.contains("_send") || name.contains("_reply")) {
            ApprovalDefault::Always
        } else {
            self.approval_default
        }
    }
}
