//! Bordereau aggregate
//!
//! A bordereau is a batch of health-claim slips moving through intake,
//! scan, dispatch, processing, payment and closure. The aggregate carries
//! the canonical lifecycle timestamps and the ownership pair; all mutations
//! flow through [`Bordereau::transition`], a pure function returning the
//! updated entity together with its history record and notifications, so
//! the persistence layer can commit the three as one guarded write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::sla::{self, SlaReport};
use core_kernel::{Actor, BordereauId, ClientId, SweepId, TeamId, UserId, DEFAULT_SLA_DAYS, WARNING_BAND_DAYS};

use crate::error::WorkflowError;
use crate::events::{self, Audience, Notification, NotificationKind};
use crate::history::{HistoryAction, TraitementHistory};
use crate::ownership::Ownership;
use crate::statut::{OwnershipEffect, StampSlot, Statut};

/// Urgency grade shown in the corbeilles
///
/// The stored value is the intake estimate; corbeilles recompute a live one
/// from the SLA report and the actual document count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priorite {
    Normale,
    Haute,
    Urgente,
}

impl Priorite {
    pub const ALL: [Priorite; 3] = [Priorite::Normale, Priorite::Haute, Priorite::Urgente];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priorite::Normale => "NORMALE",
            Priorite::Haute => "HAUTE",
            Priorite::Urgente => "URGENTE",
        }
    }
}

impl std::str::FromStr for Priorite {
    type Err = core_kernel::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priorite::ALL
            .iter()
            .find(|priorite| priorite.as_str() == s)
            .copied()
            .ok_or_else(|| core_kernel::CoreError::validation(format!("unknown priorite: {s}")))
    }
}

/// Live urgency from the running deadline and the real batch size
pub fn compute_priorite(report: &SlaReport, document_count: i64) -> Priorite {
    if report.status == core_kernel::SlaStatus::Overdue {
        Priorite::Urgente
    } else if report.remaining_days <= WARNING_BAND_DAYS || document_count > 50 {
        Priorite::Haute
    } else {
        Priorite::Normale
    }
}

/// A batch of claim documents in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bordereau {
    /// Unique identifier
    pub id: BordereauId,
    /// Human reference, unique per client
    pub reference: String,
    /// Owning client
    pub client_id: ClientId,
    /// Current machine state
    pub statut: Statut,
    /// Intake urgency estimate
    pub priorite: Priorite,
    /// Declared number of claim slips (intake metadata; the linked document
    /// count is authoritative for workload math)
    pub nombre_bs: i32,
    /// Settlement deadline in days from intake
    pub delai_reglement: i64,
    /// Intake timestamp; opens both SLA clocks
    pub date_reception: DateTime<Utc>,
    /// First entry into SCAN_EN_COURS
    pub date_debut_scan: Option<DateTime<Utc>>,
    /// First entry into SCANNE
    pub date_fin_scan: Option<DateTime<Utc>>,
    /// First entry into ASSIGNE (handed to the health team)
    pub date_reception_sante: Option<DateTime<Utc>>,
    /// First entry into VIREMENT_EN_COURS
    pub date_depot_virement: Option<DateTime<Utc>>,
    /// First entry into VIREMENT_EXECUTE; closes the settlement clock
    pub date_execution_virement: Option<DateTime<Utc>>,
    /// First entry into CLOTURE; closes the processing clock
    pub date_cloture: Option<DateTime<Utc>>,
    /// Who holds the file
    pub ownership: Ownership,
    /// Team in custody (the chef's team)
    pub team_id: Option<TeamId>,
    /// Soft-deleted files keep their data but leave every projection
    pub archived: bool,
    /// Optimistic-lock counter, bumped by the store on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One requested status change
#[derive(Debug, Clone)]
pub struct TransitionCommand {
    pub target: Statut,
    pub actor: Actor,
    pub reason: Option<String>,
    /// Handler taking the file; required when the target is ASSIGNE
    pub assign_to: Option<UserId>,
    /// History label; defaults to a plain transition
    pub action: HistoryAction,
    /// Dedup key when a sweep run drives the change
    pub sweep_id: Option<SweepId>,
    pub now: DateTime<Utc>,
}

impl TransitionCommand {
    pub fn new(target: Statut, actor: Actor, now: DateTime<Utc>) -> Self {
        Self {
            target,
            actor,
            reason: None,
            assign_to: None,
            action: HistoryAction::Transition,
            sweep_id: None,
            now,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_assignee(mut self, user: UserId) -> Self {
        self.assign_to = Some(user);
        self
    }

    pub fn with_action(mut self, action: HistoryAction) -> Self {
        self.action = action;
        self
    }

    pub fn from_sweep(mut self, sweep_id: SweepId) -> Self {
        self.sweep_id = Some(sweep_id);
        self.action = HistoryAction::Escalation;
        self
    }
}

/// Result of a successful transition: entity, audit record and events, to
/// be committed as one unit
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub bordereau: Bordereau,
    pub history: TraitementHistory,
    pub notifications: Vec<Notification>,
}

impl Bordereau {
    /// Intake of a new bordereau, always in `EN_ATTENTE`
    pub fn receive(
        reference: impl Into<String>,
        client_id: ClientId,
        nombre_bs: i32,
        delai_reglement: Option<i64>,
        team_id: Option<TeamId>,
        now: DateTime<Utc>,
    ) -> Result<Self, WorkflowError> {
        let reference = reference.into().trim().to_string();
        if reference.is_empty() {
            return Err(WorkflowError::validation("reference must not be empty"));
        }
        if nombre_bs < 0 {
            return Err(WorkflowError::validation("nombre_bs must not be negative"));
        }
        let delai_reglement = delai_reglement.unwrap_or(DEFAULT_SLA_DAYS);
        if delai_reglement <= 0 {
            return Err(WorkflowError::validation("delai_reglement must be positive"));
        }

        Ok(Self {
            id: BordereauId::new_v7(),
            reference,
            client_id,
            statut: Statut::initial(),
            priorite: Priorite::Normale,
            nombre_bs,
            delai_reglement,
            date_reception: now,
            date_debut_scan: None,
            date_fin_scan: None,
            date_reception_sante: None,
            date_depot_virement: None,
            date_execution_virement: None,
            date_cloture: None,
            ownership: Ownership::unassigned(),
            team_id,
            archived: false,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// The history record matching intake, appended with the insert
    pub fn creation_record(&self, actor: &Actor) -> TraitementHistory {
        TraitementHistory::record(
            self.id,
            actor.user_id,
            HistoryAction::Creation,
            self.created_at,
        )
        .with_statuts(None, self.statut)
    }

    /// Applies one status change, returning the updated copy
    ///
    /// Pure: no I/O, no clock reads, the entity is untouched on any error.
    /// Checks run in order (archived, legal edge, role, reason, custody),
    /// then the canonical timestamp is stamped if this is the first entry,
    /// the ownership pair is adjusted for the target state and exactly one
    /// history record is produced.
    pub fn transition(&self, cmd: TransitionCommand) -> Result<TransitionOutcome, WorkflowError> {
        if self.archived {
            return Err(WorkflowError::Archived { id: self.id });
        }
        if !self.statut.can_transition_to(cmd.target) {
            return Err(WorkflowError::InvalidTransition {
                from: self.statut,
                to: cmd.target,
            });
        }
        if !self.statut.role_may_drive(cmd.target, cmd.actor.role) {
            return Err(WorkflowError::UnauthorizedTransition {
                role: cmd.actor.role,
                from: self.statut,
                to: cmd.target,
            });
        }
        let reason = cmd.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        if cmd.target.requires_reason() && reason.is_none() {
            return Err(WorkflowError::ReasonRequired { target: cmd.target });
        }
        // A plain gestionnaire may only move files they actively hold; the
        // chef and super-admin act for the whole team.
        if self.statut.is_active_handling() && cmd.actor.role.is_gestionnaire() {
            let holder = self.ownership.active_handler(self.statut);
            if holder != Some(cmd.actor.user_id) {
                return Err(WorkflowError::NotCurrentHandler {
                    user_id: cmd.actor.user_id,
                });
            }
        }

        let ownership = match cmd.target.ownership_on_entry() {
            OwnershipEffect::Keep => self.ownership,
            OwnershipEffect::ClearAssignment => {
                // A chef personally pulling a file into difficulty stays on
                // record as its holder; sweep runs leave it for triage.
                if cmd.target == Statut::EnDifficulte
                    && cmd.actor.role.leads_team()
                    && !cmd.actor.is_system()
                {
                    Ownership::held_by(cmd.actor.user_id)
                } else {
                    Ownership::unassigned()
                }
            }
            OwnershipEffect::TakeAssignment => {
                let user = cmd.assign_to.ok_or(WorkflowError::AssigneeRequired)?;
                Ownership::assigned(user)
            }
            OwnershipEffect::StartHandling => {
                let handler = self.ownership.assigned_to().unwrap_or(cmd.actor.user_id);
                Ownership::working(handler)
            }
        };

        let mut updated = self.clone();
        updated.statut = cmd.target;
        updated.ownership = ownership;
        updated.updated_at = cmd.now;
        if let Some(slot) = cmd.target.stamp_on_entry() {
            updated.stamp_once(slot, cmd.now);
        }

        let mut history = TraitementHistory::record(self.id, cmd.actor.user_id, cmd.action, cmd.now)
            .with_statuts(Some(self.statut), cmd.target);
        if let Some(reason) = reason {
            history = history.with_reason(reason);
        }
        if let Some(user) = ownership.assigned_to() {
            if cmd.target.is_active_handling() {
                history = history.with_assigned_to(user);
            }
        }
        if let Some(sweep_id) = cmd.sweep_id {
            history = history.with_sweep(sweep_id);
        }

        let mut notifications = events::on_status_entered(
            self.id,
            &self.reference,
            cmd.target,
            self.team_id,
            cmd.now,
        );
        if cmd.target == Statut::Assigne {
            if let Some(user_id) = ownership.assigned_to() {
                notifications.push(Notification::new(
                    NotificationKind::Assigned,
                    self.id,
                    Audience::User { user_id },
                    format!("Bordereau {} vous est affecte", self.reference),
                    cmd.now,
                ));
            }
        }
        for notification in &mut notifications {
            notification.actor_id = Some(cmd.actor.user_id);
            if let Some(sweep_id) = cmd.sweep_id {
                notification.sweep_id = Some(sweep_id);
                if notification.kind == NotificationKind::Returned {
                    notification.kind = NotificationKind::Escalated;
                }
            }
        }

        Ok(TransitionOutcome {
            bordereau: updated,
            history,
            notifications,
        })
    }

    /// Writes the slot only on first entry; re-entries keep the original
    fn stamp_once(&mut self, slot: StampSlot, now: DateTime<Utc>) {
        let field = match slot {
            StampSlot::DebutScan => &mut self.date_debut_scan,
            StampSlot::FinScan => &mut self.date_fin_scan,
            StampSlot::ReceptionSante => &mut self.date_reception_sante,
            StampSlot::DepotVirement => &mut self.date_depot_virement,
            StampSlot::ExecutionVirement => &mut self.date_execution_virement,
            StampSlot::Cloture => &mut self.date_cloture,
        };
        if field.is_none() {
            *field = Some(now);
        }
    }

    /// Processing clock: intake to closure (or now)
    pub fn sla_processing(&self, now: DateTime<Utc>) -> SlaReport {
        sla::evaluate(self.date_reception, self.date_cloture, self.delai_reglement, now)
    }

    /// Settlement clock: intake to payment execution (or now)
    pub fn sla_settlement(&self, now: DateTime<Utc>) -> SlaReport {
        sla::evaluate(
            self.date_reception,
            self.date_execution_virement,
            self.delai_reglement,
            now,
        )
    }

    /// Days the scan stage took, once both bounds exist
    pub fn scan_duration_days(&self) -> Option<i64> {
        sla::interval_days(self.date_debut_scan, self.date_fin_scan)
    }

    /// Days from intake to closure, once closed
    pub fn total_duration_days(&self) -> Option<i64> {
        sla::interval_days(Some(self.date_reception), self.date_cloture)
    }
}
