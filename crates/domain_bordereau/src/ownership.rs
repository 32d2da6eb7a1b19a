//! Ownership of a bordereau
//!
//! Two stored fields describe who holds a file: `assigned_to` (the
//! gestionnaire the chef picked) and `current_handler` (whoever is actively
//! working it, e.g. a chef treating an escalated file personally). The pair
//! is one value object written in one piece; the statut decides which field
//! is authoritative, and a read that finds the pair out of shape reports
//! drift instead of failing, leaving the next write to normalize it.

use serde::{Deserialize, Serialize};

use core_kernel::{BordereauId, UserId};

use crate::statut::Statut;

/// Who holds a bordereau, as a single atomic value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ownership {
    assigned_to: Option<UserId>,
    current_handler: Option<UserId>,
}

impl Ownership {
    /// No individual holds the file; the team (or nobody) has custody
    pub fn unassigned() -> Self {
        Self::default()
    }

    /// The chef handed the file to a handler who has not started yet
    pub fn assigned(user: UserId) -> Self {
        Self {
            assigned_to: Some(user),
            current_handler: None,
        }
    }

    /// The handler is actively working the file
    pub fn working(user: UserId) -> Self {
        Self {
            assigned_to: Some(user),
            current_handler: Some(user),
        }
    }

    /// A stuck file held accountable by a chef, with no individual assignee
    pub fn held_by(chef: UserId) -> Self {
        Self {
            assigned_to: None,
            current_handler: Some(chef),
        }
    }

    /// Raw constructor for the persistence boundary; performs no
    /// reconciliation so read paths can detect drift.
    pub fn from_columns(assigned_to: Option<UserId>, current_handler: Option<UserId>) -> Self {
        Self {
            assigned_to,
            current_handler,
        }
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn current_handler(&self) -> Option<UserId> {
        self.current_handler
    }

    /// The handler actively charged with the file in the given statut
    ///
    /// Only the active-handling states have one; queue, payment and
    /// terminal states answer `None` even when `assigned_to` is retained
    /// for attribution.
    pub fn active_handler(&self, statut: Statut) -> Option<UserId> {
        if statut.is_active_handling() {
            self.assigned_to.or(self.current_handler)
        } else if statut == Statut::EnDifficulte {
            self.current_handler
        } else {
            None
        }
    }

    /// Checks the pair against the shape the statut expects
    ///
    /// `assigned_to` is retained after `TRAITE` so completed work stays
    /// attributed; queue states must carry no assignee; active states must
    /// carry exactly one.
    pub fn is_consistent_with(&self, statut: Statut) -> bool {
        match statut {
            Statut::EnAttente
            | Statut::AScanner
            | Statut::ScanEnCours
            | Statut::Scanne
            | Statut::AAffecter
            | Statut::Rejete => self.assigned_to.is_none() && self.current_handler.is_none(),
            Statut::EnDifficulte => self.assigned_to.is_none(),
            Statut::Assigne => {
                self.assigned_to.is_some()
                    && (self.current_handler.is_none() || self.current_handler == self.assigned_to)
            }
            Statut::EnCours | Statut::MisEnInstance => {
                self.assigned_to.is_some()
                    && (self.current_handler.is_none() || self.current_handler == self.assigned_to)
            }
            // Past TRAITE the pair is attribution history, any shape goes.
            Statut::Traite
            | Statut::PretVirement
            | Statut::VirementEnCours
            | Statut::VirementExecute
            | Statut::VirementRejete
            | Statut::Cloture => true,
        }
    }

    /// Returns the normalized pair for the statut, plus the drift report if
    /// anything had to change
    pub fn reconciled_with(
        &self,
        statut: Statut,
        bordereau_id: BordereauId,
    ) -> (Self, Option<OwnershipDrift>) {
        if self.is_consistent_with(statut) {
            return (*self, None);
        }
        let healed = match statut {
            Statut::EnAttente
            | Statut::AScanner
            | Statut::ScanEnCours
            | Statut::Scanne
            | Statut::AAffecter
            | Statut::Rejete => Self::unassigned(),
            Statut::EnDifficulte => Self {
                assigned_to: None,
                current_handler: self.current_handler,
            },
            // Two different users in the pair: the assignee wins, the
            // stray working handler is dropped.
            Statut::Assigne => match self.assigned_to.or(self.current_handler) {
                Some(user) => Self::assigned(user),
                None => Self::unassigned(),
            },
            Statut::EnCours | Statut::MisEnInstance => {
                match self.assigned_to.or(self.current_handler) {
                    Some(user) => Self::working(user),
                    None => Self::unassigned(),
                }
            }
            _ => *self,
        };
        let drift = OwnershipDrift {
            bordereau_id,
            statut,
            assigned_to: self.assigned_to,
            current_handler: self.current_handler,
        };
        (healed, Some(drift))
    }
}

/// Read-side report of an ownership pair that does not match its statut
///
/// Never an error: the engine logs it and the next write self-heals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipDrift {
    pub bordereau_id: BordereauId,
    pub statut: Statut,
    pub assigned_to: Option<UserId>,
    pub current_handler: Option<UserId>,
}
