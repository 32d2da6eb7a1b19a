//! Workflow domain services
//!
//! Orchestration between the pure aggregate and the ports: load, apply,
//! guarded write, notify. Conflict handling stays with the caller: a lost
//! optimistic-lock race returns a retryable error instead of looping here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use core_kernel::sla::SlaReport;
use core_kernel::{Actor, BordereauId, ClientId, Clock, DocumentId, Role, TeamId, UserId};

use crate::bordereau::{compute_priorite, Bordereau, Priorite, TransitionCommand};
use crate::document::{Document, DocumentStatut};
use crate::error::WorkflowError;
use crate::history::{HistoryAction, TraitementHistory};
use crate::ports::{BordereauStore, DocumentStore, NotificationPort};
use crate::statut::Statut;

/// Intake request for a new bordereau
#[derive(Debug, Clone)]
pub struct CreateBordereau {
    pub reference: String,
    pub client_id: ClientId,
    pub nombre_bs: i32,
    /// Days; falls back to the client default when absent
    pub delai_reglement: Option<i64>,
    pub team_id: Option<TeamId>,
}

/// Both SLA clocks plus the derived stage figures, freshly computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BordereauSla {
    pub processing: SlaReport,
    pub settlement: SlaReport,
    pub scan_duration_days: Option<i64>,
    pub total_duration_days: Option<i64>,
    /// Live urgency from the running clock and the real slip count
    pub priorite: Priorite,
}

/// Drives bordereaux through the state machine
///
/// Every mutation follows the same shape: read, reconcile ownership drift
/// into the pending write, apply the pure transition, commit entity and
/// history through the guarded write, publish events best-effort.
pub struct WorkflowService {
    store: Arc<dyn BordereauStore>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn BordereauStore>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            documents,
            notifier,
            clock,
        }
    }

    /// Registers a new bordereau in `EN_ATTENTE`
    ///
    /// The reference must be unique within the client; the intake record is
    /// appended with the insert.
    pub async fn create(
        &self,
        cmd: CreateBordereau,
        actor: &Actor,
    ) -> Result<Bordereau, WorkflowError> {
        if !matches!(actor.role, Role::Bo | Role::ChefEquipe | Role::SuperAdmin) {
            return Err(WorkflowError::validation(format!(
                "role {} may not register bordereaux",
                actor.role
            )));
        }
        let reference = cmd.reference.trim();
        if self.store.reference_exists(cmd.client_id, reference).await? {
            return Err(WorkflowError::DuplicateReference {
                reference: reference.to_string(),
            });
        }
        let bordereau = Bordereau::receive(
            reference,
            cmd.client_id,
            cmd.nombre_bs,
            cmd.delai_reglement,
            cmd.team_id,
            self.clock.now(),
        )?;
        let stored = self
            .store
            .insert(&bordereau, &bordereau.creation_record(actor))
            .await?;
        Ok(stored)
    }

    /// The service clock's current instant
    ///
    /// Response layers annotate entities with a clock reading taken here,
    /// so tests driving a manual clock see consistent reports end to end.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Loads one bordereau; ownership drift is reported, never fatal
    pub async fn get(&self, id: BordereauId) -> Result<Bordereau, WorkflowError> {
        let bordereau = self
            .store
            .get(id)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;
        let (_, drift) = bordereau.ownership.reconciled_with(bordereau.statut, bordereau.id);
        if let Some(drift) = drift {
            warn!(
                bordereau_id = %drift.bordereau_id,
                statut = %drift.statut,
                assigned_to = ?drift.assigned_to,
                current_handler = ?drift.current_handler,
                "ownership drift detected; next write will normalize"
            );
        }
        Ok(bordereau)
    }

    /// Freshly computed SLA clocks for one bordereau
    pub async fn sla_overview(&self, bordereau: &Bordereau) -> Result<BordereauSla, WorkflowError> {
        let now = self.clock.now();
        let document_count = self.documents.count_for(bordereau.id).await?;
        let processing = bordereau.sla_processing(now);
        Ok(BordereauSla {
            processing,
            settlement: bordereau.sla_settlement(now),
            scan_duration_days: bordereau.scan_duration_days(),
            total_duration_days: bordereau.total_duration_days(),
            priorite: compute_priorite(&processing, document_count),
        })
    }

    /// Applies one status change through the guarded write
    pub async fn transition(
        &self,
        id: BordereauId,
        target: Statut,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Bordereau, WorkflowError> {
        let mut cmd = TransitionCommand::new(target, *actor, self.clock.now());
        if let Some(reason) = reason {
            cmd = cmd.with_reason(reason);
        }
        self.apply(id, cmd).await
    }

    /// Rejects the bordereau with a mandatory reason
    pub async fn reject(
        &self,
        id: BordereauId,
        reason: String,
        actor: &Actor,
    ) -> Result<Bordereau, WorkflowError> {
        self.transition(id, Statut::Rejete, Some(reason), actor).await
    }

    /// Shared mutation path used by transitions, the assignment router and
    /// the sweep
    pub async fn apply(
        &self,
        id: BordereauId,
        cmd: TransitionCommand,
    ) -> Result<Bordereau, WorkflowError> {
        let stored = self
            .store
            .get(id)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;

        // Self-heal: a drifted ownership pair is normalized as part of
        // this write rather than failing the read.
        let mut current = stored.clone();
        let (healed, drift) = current.ownership.reconciled_with(current.statut, current.id);
        if let Some(drift) = drift {
            warn!(
                bordereau_id = %drift.bordereau_id,
                statut = %drift.statut,
                "normalizing drifted ownership in this write"
            );
            current.ownership = healed;
        }

        let outcome = current.transition(cmd)?;
        let written = self
            .store
            .update_guarded(&outcome.bordereau, stored.version, &outcome.history)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;

        for notification in outcome.notifications {
            if let Err(err) = self.notifier.publish(notification).await {
                warn!(error = %err, bordereau_id = %id, "notification publish failed");
            }
        }
        Ok(written)
    }

    /// Keyset page over the open, unarchived files
    pub async fn page_open(
        &self,
        after: Option<BordereauId>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, WorkflowError> {
        Ok(self.store.page_open(after, limit.max(1)).await?)
    }

    /// Full trajectory of one bordereau, oldest record first
    pub async fn history(&self, id: BordereauId) -> Result<Vec<TraitementHistory>, WorkflowError> {
        // Confirm existence so an unknown id answers NotFound, not empty.
        let _ = self
            .store
            .get(id)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;
        Ok(self.store.history_for(id).await?)
    }

    /// Soft delete; the file leaves every projection but keeps its data
    pub async fn archive(&self, id: BordereauId, actor: &Actor) -> Result<Bordereau, WorkflowError> {
        self.set_archived(id, true, HistoryAction::Archive, actor).await
    }

    /// Brings an archived file back into the projections
    pub async fn restore(&self, id: BordereauId, actor: &Actor) -> Result<Bordereau, WorkflowError> {
        self.set_archived(id, false, HistoryAction::Restore, actor).await
    }

    async fn set_archived(
        &self,
        id: BordereauId,
        archived: bool,
        action: HistoryAction,
        actor: &Actor,
    ) -> Result<Bordereau, WorkflowError> {
        if !actor.role.leads_team() {
            return Err(WorkflowError::validation(format!(
                "role {} may not archive or restore",
                actor.role
            )));
        }
        let stored = self
            .store
            .get(id)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;
        if stored.archived == archived {
            return Ok(stored);
        }
        let now = self.clock.now();
        let mut updated = stored.clone();
        updated.archived = archived;
        updated.updated_at = now;
        let history = TraitementHistory::record(id, actor.user_id, action, now)
            .with_statuts(Some(stored.statut), stored.statut);
        let written = self
            .store
            .update_guarded(&updated, stored.version, &history)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?;
        Ok(written)
    }

    /// Registers a scanned slip under a live bordereau
    pub async fn attach_document(
        &self,
        bordereau_id: BordereauId,
        name: String,
    ) -> Result<Document, WorkflowError> {
        let parent = self.get(bordereau_id).await?;
        let document = Document::upload(bordereau_id, parent.archived, name, self.clock.now())?;
        Ok(self.documents.insert(&document).await?)
    }

    /// Moves one slip along its coarse lifecycle
    pub async fn update_document_statut(
        &self,
        document_id: DocumentId,
        statut: DocumentStatut,
    ) -> Result<Document, WorkflowError> {
        let mut document = self.documents.get(document_id).await?;
        let parent = self.get(document.bordereau_id).await?;
        document.update_statut(statut, parent.archived, self.clock.now())?;
        Ok(self.documents.update(&document).await?)
    }

    /// Hands one slip to a handler
    pub async fn assign_document(
        &self,
        document_id: DocumentId,
        user: UserId,
    ) -> Result<Document, WorkflowError> {
        let mut document = self.documents.get(document_id).await?;
        let parent = self.get(document.bordereau_id).await?;
        document.assign(user, parent.archived, self.clock.now())?;
        Ok(self.documents.update(&document).await?)
    }

    /// Slips attached to one bordereau
    pub async fn documents_for(
        &self,
        bordereau_id: BordereauId,
    ) -> Result<Vec<Document>, WorkflowError> {
        Ok(self.documents.list_for(bordereau_id).await?)
    }
}
