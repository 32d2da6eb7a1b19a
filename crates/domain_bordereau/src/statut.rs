//! Bordereau status state machine
//!
//! The status vocabulary is closed and the legal edges form a static
//! adjacency table: both are plain `match` expressions, so an edge that is
//! not written here cannot be taken and the compiler keeps the table
//! exhaustive when a status is added.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, Role};

/// Lifecycle status of a bordereau
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Statut {
    /// Registered by the bureau d'ordre, waiting to join the scan queue
    EnAttente,
    /// Queued for digitization
    AScanner,
    /// Being digitized by the scan team
    ScanEnCours,
    /// Digitized, ready for the chef's corbeille
    Scanne,
    /// Waiting for the chef to pick a handler
    AAffecter,
    /// Handed to a gestionnaire, not yet started
    Assigne,
    /// Actively being processed
    EnCours,
    /// Processing finished, awaiting finance
    Traite,
    /// Payment batch prepared
    PretVirement,
    /// Wire transfer submitted to the bank
    VirementEnCours,
    /// Wire transfer confirmed
    VirementExecute,
    /// Wire transfer bounced; finance retries
    VirementRejete,
    /// Administratively closed
    Cloture,
    /// Refused by a handler or chef; waits for re-dispatch
    Rejete,
    /// Flagged as stuck (returned by a handler or escalated by the sweep)
    EnDifficulte,
    /// Parked by its handler, e.g. waiting on the client
    MisEnInstance,
}

/// Timestamp stamped when a status is first entered
///
/// Each slot is written exactly once; re-entering the status later leaves
/// the original value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampSlot {
    DebutScan,
    FinScan,
    ReceptionSante,
    DepotVirement,
    ExecutionVirement,
    Cloture,
}

/// What the machine does to the ownership pair when a status is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipEffect {
    /// Leave the pair as it is
    Keep,
    /// Drop the individual handler; the team keeps custody
    ClearAssignment,
    /// The file lands in a named handler's hands
    TakeAssignment,
    /// The acting user becomes the working handler
    StartHandling,
}

const CHEF: &[Role] = &[Role::ChefEquipe];
const SCAN: &[Role] = &[Role::ScanTeam];
const FINANCE: &[Role] = &[Role::Finance];
const BO: &[Role] = &[Role::Bo];
const HANDLERS: &[Role] = &[Role::Gestionnaire, Role::GestionnaireSenior, Role::ChefEquipe];
const SCAN_OR_CHEF: &[Role] = &[Role::ScanTeam, Role::ChefEquipe];
const FINANCE_OR_CHEF: &[Role] = &[Role::Finance, Role::ChefEquipe];
const HANDLERS_OR_SCAN: &[Role] = &[
    Role::Gestionnaire,
    Role::GestionnaireSenior,
    Role::ChefEquipe,
    Role::ScanTeam,
];

impl Statut {
    /// Every status, in pipeline order then side branches
    pub const ALL: [Statut; 16] = [
        Statut::EnAttente,
        Statut::AScanner,
        Statut::ScanEnCours,
        Statut::Scanne,
        Statut::AAffecter,
        Statut::Assigne,
        Statut::EnCours,
        Statut::Traite,
        Statut::PretVirement,
        Statut::VirementEnCours,
        Statut::VirementExecute,
        Statut::VirementRejete,
        Statut::Cloture,
        Statut::Rejete,
        Statut::EnDifficulte,
        Statut::MisEnInstance,
    ];

    /// The single legal entry point of the machine
    pub fn initial() -> Self {
        Statut::EnAttente
    }

    /// Wire name, matching the stored and transmitted form
    pub fn as_str(&self) -> &'static str {
        match self {
            Statut::EnAttente => "EN_ATTENTE",
            Statut::AScanner => "A_SCANNER",
            Statut::ScanEnCours => "SCAN_EN_COURS",
            Statut::Scanne => "SCANNE",
            Statut::AAffecter => "A_AFFECTER",
            Statut::Assigne => "ASSIGNE",
            Statut::EnCours => "EN_COURS",
            Statut::Traite => "TRAITE",
            Statut::PretVirement => "PRET_VIREMENT",
            Statut::VirementEnCours => "VIREMENT_EN_COURS",
            Statut::VirementExecute => "VIREMENT_EXECUTE",
            Statut::VirementRejete => "VIREMENT_REJETE",
            Statut::Cloture => "CLOTURE",
            Statut::Rejete => "REJETE",
            Statut::EnDifficulte => "EN_DIFFICULTE",
            Statut::MisEnInstance => "MIS_EN_INSTANCE",
        }
    }

    /// Terminal for scheduling: the sweep, the SLA clocks and the corbeilles
    /// stop caring once a file reaches one of these.
    ///
    /// `VIREMENT_EXECUTE` still owns the one administrative edge to
    /// `CLOTURE`; nothing reopens a closed file.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Statut::Cloture | Statut::VirementExecute)
    }

    /// States in which a handler is actively charged with the file
    ///
    /// These are the states counted into a handler's load.
    pub fn is_active_handling(&self) -> bool {
        matches!(self, Statut::Assigne | Statut::EnCours | Statut::MisEnInstance)
    }

    /// States a chef may dispatch a handler from
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Statut::Scanne | Statut::AAffecter | Statut::Rejete | Statut::EnDifficulte
        )
    }

    /// Side-branch states entered with a mandatory reason
    pub fn requires_reason(&self) -> bool {
        matches!(self, Statut::Rejete | Statut::EnDifficulte)
    }

    /// Legal edges of the machine
    ///
    /// The main chain runs intake → scan → dispatch → processing → payment
    /// → closure; `REJETE` and `EN_DIFFICULTE` are reachable from any
    /// non-terminal state and re-enter through the chef's corbeille.
    pub fn can_transition_to(&self, target: Statut) -> bool {
        use Statut::*;
        if *self == target {
            return false;
        }
        // Side branches first: any non-terminal state may be rejected or
        // flagged in difficulty.
        if matches!(target, Rejete | EnDifficulte) {
            return !self.is_terminal();
        }
        matches!(
            (*self, target),
            (EnAttente, AScanner)
                | (AScanner, ScanEnCours)
                | (ScanEnCours, Scanne)
                | (Scanne, AAffecter)
                | (Scanne, Assigne)
                | (AAffecter, Assigne)
                | (Assigne, EnCours)
                | (EnCours, Traite)
                | (EnCours, MisEnInstance)
                | (MisEnInstance, EnCours)
                | (MisEnInstance, AAffecter)
                | (Traite, PretVirement)
                | (PretVirement, VirementEnCours)
                | (VirementEnCours, VirementExecute)
                | (VirementEnCours, VirementRejete)
                | (VirementRejete, VirementEnCours)
                | (VirementExecute, Cloture)
                | (Rejete, AAffecter)
                | (Rejete, Assigne)
                | (EnDifficulte, AAffecter)
                | (EnDifficulte, Assigne)
        )
    }

    /// Roles allowed to drive a legal edge
    ///
    /// `SUPER_ADMIN` drives any legal edge and is checked separately in
    /// [`Statut::role_may_drive`]; the slices list the business roles.
    pub fn authorized_roles(&self, target: Statut) -> &'static [Role] {
        use Statut::*;
        match (*self, target) {
            (EnAttente, AScanner) => BO,
            (AScanner, ScanEnCours) => SCAN,
            (ScanEnCours, Scanne) => SCAN,
            (Scanne, AAffecter) => SCAN_OR_CHEF,
            (Scanne, Assigne) => CHEF,
            (AAffecter, Assigne) => CHEF,
            (Assigne, EnCours) => HANDLERS,
            (EnCours, Traite) => HANDLERS,
            (EnCours, MisEnInstance) => HANDLERS,
            (MisEnInstance, EnCours) => HANDLERS,
            (MisEnInstance, AAffecter) => CHEF,
            (Traite, PretVirement) => FINANCE,
            (PretVirement, VirementEnCours) => FINANCE,
            (VirementEnCours, VirementExecute) => FINANCE,
            (VirementEnCours, VirementRejete) => FINANCE,
            (VirementRejete, VirementEnCours) => FINANCE,
            (VirementExecute, Cloture) => FINANCE_OR_CHEF,
            (Rejete, AAffecter) | (Rejete, Assigne) => CHEF,
            (EnDifficulte, AAffecter) | (EnDifficulte, Assigne) => CHEF,
            // Rejections out of the payment stages belong to finance; the
            // rest of the pipeline rejects through the handling roles.
            (PretVirement | VirementEnCours | VirementRejete, Rejete) => FINANCE_OR_CHEF,
            (_, Rejete) => HANDLERS,
            (PretVirement | VirementEnCours | VirementRejete, EnDifficulte) => FINANCE_OR_CHEF,
            (_, EnDifficulte) => HANDLERS_OR_SCAN,
            _ => &[],
        }
    }

    /// Complete edge authorization: the edge must be legal and the role one
    /// of the edge's business roles (or `SUPER_ADMIN`).
    pub fn role_may_drive(&self, target: Statut, role: Role) -> bool {
        if !self.can_transition_to(target) {
            return false;
        }
        role == Role::SuperAdmin || self.authorized_roles(target).contains(&role)
    }

    /// Canonical timestamp written when this status is first entered
    pub fn stamp_on_entry(&self) -> Option<StampSlot> {
        match self {
            Statut::ScanEnCours => Some(StampSlot::DebutScan),
            Statut::Scanne => Some(StampSlot::FinScan),
            Statut::Assigne => Some(StampSlot::ReceptionSante),
            Statut::VirementEnCours => Some(StampSlot::DepotVirement),
            Statut::VirementExecute => Some(StampSlot::ExecutionVirement),
            Statut::Cloture => Some(StampSlot::Cloture),
            _ => None,
        }
    }

    /// Ownership adjustment applied when this status is entered
    pub fn ownership_on_entry(&self) -> OwnershipEffect {
        match self {
            Statut::AAffecter | Statut::Rejete | Statut::EnDifficulte => {
                OwnershipEffect::ClearAssignment
            }
            Statut::Assigne => OwnershipEffect::TakeAssignment,
            Statut::EnCours => OwnershipEffect::StartHandling,
            _ => OwnershipEffect::Keep,
        }
    }
}

impl fmt::Display for Statut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statut {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Statut::ALL
            .iter()
            .find(|statut| statut.as_str() == s)
            .copied()
            .ok_or_else(|| CoreError::validation(format!("unknown statut: {s}")))
    }
}
