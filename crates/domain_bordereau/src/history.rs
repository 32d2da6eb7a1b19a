//! Append-only treatment history
//!
//! One record per successful mutation, written in the same transaction as
//! the entity. There is no update or delete path: reading the chain back in
//! timestamp order (id as tiebreak) reconstructs the file's trajectory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BordereauId, HistoryId, SweepId, UserId};

use crate::statut::Statut;

/// Kind of mutation a history record captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    /// Intake of a new bordereau
    Creation,
    /// A status change through the state machine
    Transition,
    /// A chef (or policy) handed the file to a handler
    Assignment,
    /// The file moved from one handler to another
    Reassignment,
    /// One entry of a chef's bulk dispatch
    BulkAssignment,
    /// The sweep flagged the file into difficulty
    Escalation,
    /// Soft delete
    Archive,
    /// Soft delete undone
    Restore,
}

impl HistoryAction {
    pub const ALL: [HistoryAction; 8] = [
        HistoryAction::Creation,
        HistoryAction::Transition,
        HistoryAction::Assignment,
        HistoryAction::Reassignment,
        HistoryAction::BulkAssignment,
        HistoryAction::Escalation,
        HistoryAction::Archive,
        HistoryAction::Restore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Creation => "CREATION",
            HistoryAction::Transition => "TRANSITION",
            HistoryAction::Assignment => "ASSIGNMENT",
            HistoryAction::Reassignment => "REASSIGNMENT",
            HistoryAction::BulkAssignment => "BULK_ASSIGNMENT",
            HistoryAction::Escalation => "ESCALATION",
            HistoryAction::Archive => "ARCHIVE",
            HistoryAction::Restore => "RESTORE",
        }
    }
}

impl std::str::FromStr for HistoryAction {
    type Err = core_kernel::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HistoryAction::ALL
            .iter()
            .find(|action| action.as_str() == s)
            .copied()
            .ok_or_else(|| core_kernel::CoreError::validation(format!("unknown history action: {s}")))
    }
}

/// One immutable entry of a bordereau's trajectory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitementHistory {
    pub id: HistoryId,
    pub bordereau_id: BordereauId,
    /// Who performed the mutation (the system actor for sweep runs)
    pub user_id: UserId,
    pub action: HistoryAction,
    pub from_statut: Option<Statut>,
    pub to_statut: Option<Statut>,
    /// Handler the mutation left in charge, when it named one
    pub assigned_to: Option<UserId>,
    pub reason: Option<String>,
    /// Dedup key of the sweep run that produced this record, if any
    pub sweep_id: Option<SweepId>,
    pub created_at: DateTime<Utc>,
}

impl TraitementHistory {
    /// Builds a record; time-ordered ids keep the chain sortable even for
    /// same-millisecond writes.
    pub fn record(
        bordereau_id: BordereauId,
        user_id: UserId,
        action: HistoryAction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::new_v7(),
            bordereau_id,
            user_id,
            action,
            from_statut: None,
            to_statut: None,
            assigned_to: None,
            reason: None,
            sweep_id: None,
            created_at,
        }
    }

    pub fn with_statuts(mut self, from: Option<Statut>, to: Statut) -> Self {
        self.from_statut = from;
        self.to_statut = Some(to);
        self
    }

    pub fn with_assigned_to(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_sweep(mut self, sweep_id: SweepId) -> Self {
        self.sweep_id = Some(sweep_id);
        self
    }
}
