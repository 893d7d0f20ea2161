//! Domain errors for the butler execution-control plane.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the butler system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Contact not found: {0}")]
    ContactNotFound(Uuid),

    #[error("Pending action not found: {0}")]
    ActionNotFound(Uuid),

    #[error("Approval rule not found: {0}")]
    RuleNotFound(Uuid),

    #[error("Scheduled task not found: {0}")]
    ScheduledTaskNotFound(Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Channel already bound: {channel_type}:{channel_value}")]
    ChannelAlreadyBound { channel_type: String, channel_value: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
