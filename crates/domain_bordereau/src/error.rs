//! Workflow domain errors

use thiserror::Error;

use core_kernel::{BordereauId, PortError, Role, UserId};

use crate::statut::Statut;

/// Errors that can occur while driving a bordereau through the pipeline
///
/// The taxonomy is fixed so callers branch on kind: validation failures
/// reject the request and leave the entity untouched, conflicts invite a
/// retry, unavailability signals a backend outage.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Bordereau not found: {id}")]
    NotFound { id: BordereauId },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: Statut, to: Statut },

    #[error("Role {role} may not drive {from} to {to}")]
    UnauthorizedTransition { role: Role, from: Statut, to: Statut },

    #[error("A reason is required to enter {target}")]
    ReasonRequired { target: Statut },

    #[error("Entering ASSIGNE requires a handler")]
    AssigneeRequired,

    #[error("User {user_id} does not hold this bordereau")]
    NotCurrentHandler { user_id: UserId },

    #[error("Bordereau {id} is archived")]
    Archived { id: BordereauId },

    #[error("Reference {reference} already exists for this client")]
    DuplicateReference { reference: String },

    #[error("Validation error: {0}")]
    Validation(String),

    /// The write lost an optimistic-concurrency race; retry with a fresh read
    #[error("Concurrent update: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    /// True when the same call may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict(_) | WorkflowError::Unavailable(_))
    }

    /// Maps a port failure onto the domain taxonomy, keeping the id for
    /// not-found reporting
    pub fn from_port(err: PortError, id: BordereauId) -> Self {
        match err {
            PortError::NotFound { .. } => WorkflowError::NotFound { id },
            other => other.into(),
        }
    }
}

impl From<PortError> for WorkflowError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Conflict { message } => WorkflowError::Conflict(message),
            PortError::Validation { message, .. } => WorkflowError::Validation(message),
            PortError::NotFound { entity_type, id } => {
                WorkflowError::Internal(format!("{entity_type} {id} missing"))
            }
            other if other.is_transient() => WorkflowError::Unavailable(other.to_string()),
            other => WorkflowError::Internal(other.to_string()),
        }
    }
}
