//! Executor: runs an `approved` action's handler exactly once, persisting
//! `execution_result` atomically with the `approved -> executed` transition.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{ActionStatus, ApprovalEvent, ApprovalEventType, ExecutionResult};
use crate::domain::ports::{ApprovalEventRepository, ModuleRegistryLookup, PendingActionRepository};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("action {0} is not in approved state")]
    NotApproved(Uuid),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

pub struct Executor {
    actions: Arc<dyn PendingActionRepository>,
    events: Arc<dyn ApprovalEventRepository>,
    registry: Arc<dyn ModuleRegistryLookup>,
}

impl Executor {
    pub fn new(
        actions: Arc<dyn PendingActionRepository>,
        events: Arc<dyn ApprovalEventRepository>,
        registry: Arc<dyn ModuleRegistryLookup>,
    ) -> Self {
        Self { actions, events, registry }
    }

    /// Run the handler registered for `action_id`'s tool and persist the
    /// result. If no handler is wired, the action still advances to
    /// `executed` with a null result (manual-approval fallback).
    pub async fn execute(&self, action_id: Uuid) -> ExecutorResult<ExecutionResult> {
        let action = self.actions.get(action_id).await?.ok_or(DomainError::ActionNotFound(action_id))?;
        if action.status != ActionStatus::Approved {
            return Err(ExecutorError::NotApproved(action_id));
        }

        let result = match self.registry.handler_for(&action.tool_name) {
            Some(handler) => match handler.call(action.tool_args.clone()).await {
                Ok(value) => ExecutionResult::success(value),
                Err(e) => ExecutionResult::failure(e.to_string()),
            },
            None => ExecutionResult { success: true, result: None, error: None, executed_at: chrono::Utc::now() },
        };

        self.actions.complete_execution(action_id, &result).await?;

        let event_type = if result.success { ApprovalEventType::ExecutionSucceeded } else { ApprovalEventType::ExecutionFailed };
        self.events
            .append(&ApprovalEvent::new(event_type, Some(action_id), action.rule_id, "system", result.error.clone()))
            .await?;

        Ok(result)
    }
}
