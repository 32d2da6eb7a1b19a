//! Dispatch domain errors

use core_kernel::{PortError, TeamId, UserId};
use domain_bordereau::error::WorkflowError;
use thiserror::Error;

/// Errors raised by the corbeille, assignment and escalation services
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The team has no active gestionnaires to pick from
    #[error("team {team_id} has no active gestionnaires")]
    EmptyPool { team_id: TeamId },

    /// Every eligible handler sits at or over the team ceiling
    ///
    /// Non-fatal by contract: the caller may alert, wait, reroute or
    /// override with a direct assignment.
    #[error("team {team_id} is saturated: every handler at or over {max_load}")]
    Overflow { team_id: TeamId, max_load: i32 },

    /// The named assignee cannot take this file
    #[error("user {user_id} cannot take assignments: {detail}")]
    IneligibleAssignee { user_id: UserId, detail: String },

    /// Another sweep run currently holds the in-process guard
    #[error("an escalation sweep is already running")]
    SweepInProgress,

    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying workflow mutation failed
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl DispatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        DispatchError::Validation(message.into())
    }

    pub fn ineligible(user_id: UserId, detail: impl Into<String>) -> Self {
        DispatchError::IneligibleAssignee {
            user_id,
            detail: detail.into(),
        }
    }

    /// True when waiting and retrying the same call can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Workflow(inner) => inner.is_retryable(),
            DispatchError::SweepInProgress => true,
            _ => false,
        }
    }

    /// True for the saturation outcome callers handle specially
    pub fn is_overflow(&self) -> bool {
        matches!(self, DispatchError::Overflow { .. })
    }
}

impl From<PortError> for DispatchError {
    fn from(err: PortError) -> Self {
        DispatchError::Workflow(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_flagged_not_retryable() {
        let err = DispatchError::Overflow {
            team_id: TeamId::new(),
            max_load: 50,
        };
        assert!(err.is_overflow());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_passes_through_retryable() {
        let err: DispatchError = PortError::conflict("version moved").into();
        assert!(err.is_retryable());
        assert!(!err.is_overflow());
    }

    #[test]
    fn test_sweep_guard_is_retryable() {
        assert!(DispatchError::SweepInProgress.is_retryable());
    }
}
