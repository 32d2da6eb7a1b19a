//! Bordereau DTOs
//!
//! Requests are validated before reaching the services; responses flatten
//! the aggregate (the ownership pair becomes two plain columns) and render
//! closed vocabularies under their wire names.

use chrono::{DateTime, Utc};
use core_kernel::sla::SlaReport;
use domain_bordereau::bordereau::Bordereau;
use domain_bordereau::document::{Document, DocumentStatut};
use domain_bordereau::history::TraitementHistory;
use domain_bordereau::services::BordereauSla;
use domain_bordereau::statut::Statut;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBordereauRequest {
    #[validate(length(min = 1, max = 64))]
    pub reference: String,
    pub client_id: Uuid,
    #[validate(range(min = 0))]
    pub nombre_bs: i32,
    /// Days; the client default applies when absent
    #[validate(range(min = 1, max = 365))]
    pub delai_reglement: Option<i64>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionRequest {
    pub statut: Statut,
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Keyset cursor; pass the last id of the previous page
    pub after: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachDocumentRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentStatutRequest {
    pub statut: DocumentStatut,
}

#[derive(Debug, Deserialize)]
pub struct AssignDocumentRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BordereauResponse {
    pub id: Uuid,
    pub reference: String,
    pub client_id: Uuid,
    pub statut: String,
    pub priorite: String,
    pub nombre_bs: i32,
    pub delai_reglement: i64,
    pub date_reception: DateTime<Utc>,
    pub date_debut_scan: Option<DateTime<Utc>>,
    pub date_fin_scan: Option<DateTime<Utc>>,
    pub date_reception_sante: Option<DateTime<Utc>>,
    pub date_depot_virement: Option<DateTime<Utc>>,
    pub date_execution_virement: Option<DateTime<Utc>>,
    pub date_cloture: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub current_handler: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub archived: bool,
    pub version: i64,
    /// Processing clock at response time
    pub sla: SlaReport,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BordereauResponse {
    /// Flattens the entity, annotating it with the clock reading `now`
    pub fn from_entity(bordereau: Bordereau, now: DateTime<Utc>) -> Self {
        let sla = bordereau.sla_processing(now);
        Self::with_sla(bordereau, sla)
    }

    /// Flattens the entity around an already computed report
    pub fn with_sla(b: Bordereau, sla: SlaReport) -> Self {
        Self {
            id: *b.id.as_uuid(),
            reference: b.reference.clone(),
            client_id: *b.client_id.as_uuid(),
            statut: b.statut.as_str().to_string(),
            priorite: b.priorite.as_str().to_string(),
            nombre_bs: b.nombre_bs,
            delai_reglement: b.delai_reglement,
            date_reception: b.date_reception,
            date_debut_scan: b.date_debut_scan,
            date_fin_scan: b.date_fin_scan,
            date_reception_sante: b.date_reception_sante,
            date_depot_virement: b.date_depot_virement,
            date_execution_virement: b.date_execution_virement,
            date_cloture: b.date_cloture,
            assigned_to: b.ownership.assigned_to().map(|u| *u.as_uuid()),
            current_handler: b.ownership.current_handler().map(|u| *u.as_uuid()),
            team_id: b.team_id.map(|t| *t.as_uuid()),
            archived: b.archived,
            version: b.version,
            sla,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub bordereau_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub from_statut: Option<String>,
    pub to_statut: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reason: Option<String>,
    pub sweep_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TraitementHistory> for HistoryEntryResponse {
    fn from(h: TraitementHistory) -> Self {
        Self {
            id: *h.id.as_uuid(),
            bordereau_id: *h.bordereau_id.as_uuid(),
            user_id: *h.user_id.as_uuid(),
            action: h.action.as_str().to_string(),
            from_statut: h.from_statut.map(|s| s.as_str().to_string()),
            to_statut: h.to_statut.map(|s| s.as_str().to_string()),
            assigned_to: h.assigned_to.map(|u| *u.as_uuid()),
            reason: h.reason,
            sweep_id: h.sweep_id.map(|s| *s.as_uuid()),
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub bordereau_id: Uuid,
    pub name: String,
    pub statut: String,
    pub assigned_to: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        Self {
            id: *d.id.as_uuid(),
            bordereau_id: *d.bordereau_id.as_uuid(),
            name: d.name,
            statut: d.statut.as_str().to_string(),
            assigned_to: d.assigned_to.map(|u| *u.as_uuid()),
            uploaded_at: d.uploaded_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlaResponse {
    pub processing: SlaReport,
    pub settlement: SlaReport,
    pub scan_duration_days: Option<i64>,
    pub total_duration_days: Option<i64>,
    pub priorite: String,
}

impl From<BordereauSla> for SlaResponse {
    fn from(sla: BordereauSla) -> Self {
        Self {
            processing: sla.processing,
            settlement: sla.settlement,
            scan_duration_days: sla.scan_duration_days,
            total_duration_days: sla.total_duration_days,
            priorite: sla.priorite.as_str().to_string(),
        }
    }
}
