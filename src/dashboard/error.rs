//! Dashboard error envelope: `{error:{code, message, butler?}}` per the
//! read API's error contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::errors::DomainError;

#[derive(Debug)]
pub enum ApiError {
    ButlerNotFound(String),
    ButlerUnreachable(String, String),
    Validation(String),
    Domain(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self::Domain(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    butler: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, butler) = match self {
            Self::ButlerNotFound(name) => {
                (StatusCode::NOT_FOUND, "BUTLER_NOT_FOUND", format!("no butler named '{name}'"), Some(name))
            }
            Self::ButlerUnreachable(name, reason) => {
                (StatusCode::BAD_GATEWAY, "BUTLER_UNREACHABLE", reason, Some(name))
            }
            Self::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message, None),
            Self::Domain(e) => {
                let status = match &e {
                    DomainError::ActionNotFound(_)
                    | DomainError::RuleNotFound(_)
                    | DomainError::ScheduledTaskNotFound(_)
                    | DomainError::SessionNotFound(_)
                    | DomainError::ContactNotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::ChannelAlreadyBound { .. } | DomainError::ConcurrencyConflict { .. } => {
                        StatusCode::CONFLICT
                    }
                    DomainError::ValidationFailed(_) | DomainError::InvalidStateTransition { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    DomainError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    DomainError::DatabaseError(_) | DomainError::SerializationError(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let code: &'static str = match status {
                    StatusCode::NOT_FOUND => "NOT_FOUND",
                    StatusCode::CONFLICT => "CONFLICT",
                    StatusCode::UNPROCESSABLE_ENTITY => "VALIDATION_ERROR",
                    _ => "INTERNAL_ERROR",
                };
                (status, code, e.to_string(), None)
            }
        };

        (status, axum::Json(ErrorBody { error: ErrorDetail { code, message, butler } })).into_response()
    }
}
