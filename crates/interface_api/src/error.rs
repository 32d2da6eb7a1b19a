//! API error handling
//!
//! Domain and port failures funnel into one [`ApiError`] taxonomy so every
//! endpoint answers with the same envelope. Saturation keeps its own
//! variant: a 409 with `team_overload` is an operational signal the front
//! end reacts to, not a plain conflict.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::{PortError, TeamId};
use domain_bordereau::error::WorkflowError;
use domain_dispatch::DispatchError;
use serde::Serialize;
use thiserror::Error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Every handler of the team sits at or over the ceiling
    #[error("Team {team_id} is saturated at {max_load}")]
    TeamOverload { team_id: TeamId, max_load: i32 },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::TeamOverload { team_id, max_load } => (
                StatusCode::CONFLICT,
                "team_overload",
                format!("team {team_id} is saturated: every handler at or over {max_load}"),
                Some(vec![format!("max_load: {max_load}")]),
            ),
            ApiError::Validation { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                message,
                if details.is_empty() {
                    None
                } else {
                    Some(details)
                },
            ),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            WorkflowError::UnauthorizedTransition { .. }
            | WorkflowError::NotCurrentHandler { .. } => ApiError::Forbidden(err.to_string()),
            WorkflowError::InvalidTransition { .. }
            | WorkflowError::ReasonRequired { .. }
            | WorkflowError::AssigneeRequired
            | WorkflowError::Validation(_) => ApiError::validation(err.to_string()),
            WorkflowError::Archived { .. }
            | WorkflowError::DuplicateReference { .. }
            | WorkflowError::Conflict(_) => ApiError::Conflict(err.to_string()),
            WorkflowError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
            WorkflowError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Overflow { team_id, max_load } => {
                ApiError::TeamOverload { team_id, max_load }
            }
            DispatchError::EmptyPool { .. }
            | DispatchError::IneligibleAssignee { .. }
            | DispatchError::Validation(_) => ApiError::validation(err.to_string()),
            DispatchError::SweepInProgress => ApiError::Conflict(err.to_string()),
            DispatchError::Workflow(inner) => inner.into(),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { .. } => ApiError::validation(err.to_string()),
            PortError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            PortError::Unauthorized { .. } => ApiError::Unauthorized,
            PortError::Connection { .. }
            | PortError::Timeout { .. }
            | PortError::ServiceUnavailable { .. } => ApiError::Unavailable(err.to_string()),
            PortError::Transformation { .. } | PortError::Internal { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let details: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        ApiError::Validation {
            message: "request validation failed".to_string(),
            details,
        }
    }
}
