//! Corbeille handlers

use axum::{extract::State, Extension, Json};
use validator::Validate;

use core_kernel::{Actor, BordereauId, UserId};
use domain_dispatch::services::BulkAssignmentReport;

use crate::dto::dispatch::{BulkAssignRequest, CorbeilleResponse};
use crate::{error::ApiError, AppState};

/// The caller's work queue, resolved from one bounded snapshot
pub async fn get_corbeille(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<CorbeilleResponse>, ApiError> {
    let corbeille = state.corbeilles.resolve(&actor).await?;
    Ok(Json(corbeille.into()))
}

/// Hands a list of files to one handler; per-entity failures are reported
/// in the body, never aborting the batch
pub async fn bulk_assign(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<BulkAssignmentReport>, ApiError> {
    request.validate()?;
    let ids: Vec<BordereauId> = request
        .bordereau_ids
        .into_iter()
        .map(BordereauId::from_uuid)
        .collect();
    let report = state
        .assignments
        .bulk_assign(ids, UserId::from_uuid(request.assigned_to), &actor)
        .await?;
    Ok(Json(report))
}
