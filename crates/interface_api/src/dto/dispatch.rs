//! Dispatch and corbeille DTOs

use chrono::{DateTime, Utc};
use core_kernel::sla::SlaReport;
use domain_dispatch::services::AssignmentOutcome;
use domain_dispatch::{AssignmentPolicy, Corbeille, CorbeilleItem, CorbeilleStats, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::bordereau::BordereauResponse;

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    /// Target team; the file's custody team, then the chef's own, apply
    /// when absent
    pub team_id: Option<Uuid>,
    pub policy: Option<AssignmentPolicy>,
    /// Direct pick; skips policy selection and the ceiling
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReassignmentRequest {
    pub team_id: Option<Uuid>,
    pub policy: Option<AssignmentPolicy>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkAssignRequest {
    #[validate(length(min = 1, max = 100))]
    pub bordereau_ids: Vec<Uuid>,
    pub assigned_to: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamConfigRequest {
    #[validate(range(min = 1, max = 200))]
    pub max_load: i32,
    pub auto_reassign_enabled: bool,
    pub overflow_action: AssignmentPolicy,
    #[validate(range(min = 0, max = 200))]
    pub alert_threshold: i32,
}

#[derive(Debug, Serialize)]
pub struct HandlerResponse {
    pub id: Uuid,
    pub display_name: String,
    pub role: String,
    pub team_leader_id: Option<Uuid>,
    pub capacity: Option<i32>,
    pub active: bool,
}

impl From<User> for HandlerResponse {
    fn from(u: User) -> Self {
        Self {
            id: *u.id.as_uuid(),
            display_name: u.display_name,
            role: u.role.as_str().to_string(),
            team_leader_id: u.team_leader_id.map(|t| *t.as_uuid()),
            capacity: u.capacity,
            active: u.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub bordereau: BordereauResponse,
    pub handler: HandlerResponse,
}

impl AssignmentResponse {
    pub fn from_outcome(outcome: AssignmentOutcome, now: DateTime<Utc>) -> Self {
        Self {
            bordereau: BordereauResponse::from_entity(outcome.bordereau, now),
            handler: outcome.handler.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CorbeilleItemResponse {
    pub bordereau: BordereauResponse,
    /// Processing clock at resolution time
    pub sla: SlaReport,
    /// Live urgency; may differ from the stored intake estimate
    pub priorite: String,
    pub document_count: i64,
}

impl From<CorbeilleItem> for CorbeilleItemResponse {
    fn from(item: CorbeilleItem) -> Self {
        Self {
            sla: item.sla,
            priorite: item.priorite.as_str().to_string(),
            document_count: item.document_count,
            bordereau: BordereauResponse::with_sla(item.bordereau, item.sla),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CorbeilleResponse {
    pub ready: Vec<CorbeilleItemResponse>,
    pub in_progress: Vec<CorbeilleItemResponse>,
    pub completed: Vec<CorbeilleItemResponse>,
    pub stats: CorbeilleStats,
}

impl From<Corbeille> for CorbeilleResponse {
    fn from(c: Corbeille) -> Self {
        Self {
            ready: c.ready.into_iter().map(Into::into).collect(),
            in_progress: c.in_progress.into_iter().map(Into::into).collect(),
            completed: c.completed.into_iter().map(Into::into).collect(),
            stats: c.stats,
        }
    }
}
