//! Bordereau handlers
//!
//! The state machine endpoints. Every mutation extracts the [`Actor`] the
//! auth middleware resolved; the services decide what that actor may do.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Actor, BordereauId, ClientId, DocumentId, TeamId, UserId};
use domain_bordereau::services::CreateBordereau;
use domain_dispatch::services::{AssignRequest, ReassignRequest};

use crate::dto::bordereau::*;
use crate::dto::dispatch::{AssignmentRequest, AssignmentResponse, ReassignmentRequest};
use crate::{error::ApiError, AppState};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

/// Registers a new bordereau
pub async fn create_bordereau(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBordereauRequest>,
) -> Result<(StatusCode, Json<BordereauResponse>), ApiError> {
    request.validate()?;
    let created = state
        .workflow
        .create(
            CreateBordereau {
                reference: request.reference,
                client_id: ClientId::from_uuid(request.client_id),
                nombre_bs: request.nombre_bs,
                delai_reglement: request.delai_reglement,
                team_id: request.team_id.map(TeamId::from_uuid),
            },
            &actor,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BordereauResponse::from_entity(created, state.workflow.now())),
    ))
}

/// Pages through the open, unarchived files
pub async fn list_bordereaux(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BordereauResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let page = state
        .workflow
        .page_open(query.after.map(BordereauId::from_uuid), limit)
        .await?;
    let now = state.workflow.now();
    Ok(Json(
        page.into_iter()
            .map(|b| BordereauResponse::from_entity(b, now))
            .collect(),
    ))
}

/// Gets a bordereau by ID
pub async fn get_bordereau(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BordereauResponse>, ApiError> {
    let bordereau = state.workflow.get(BordereauId::from_uuid(id)).await?;
    Ok(Json(BordereauResponse::from_entity(
        bordereau,
        state.workflow.now(),
    )))
}

/// Full trajectory of one bordereau, oldest record first
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let history = state.workflow.history(BordereauId::from_uuid(id)).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// Freshly computed SLA clocks for one bordereau
pub async fn get_sla(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlaResponse>, ApiError> {
    let bordereau = state.workflow.get(BordereauId::from_uuid(id)).await?;
    let sla = state.workflow.sla_overview(&bordereau).await?;
    Ok(Json(sla.into()))
}

/// Applies one status change
pub async fn transition(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BordereauResponse>, ApiError> {
    request.validate()?;
    let updated = state
        .workflow
        .transition(
            BordereauId::from_uuid(id),
            request.statut,
            request.reason,
            &actor,
        )
        .await?;
    Ok(Json(BordereauResponse::from_entity(
        updated,
        state.workflow.now(),
    )))
}

/// Rejects the bordereau with a mandatory reason
pub async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<BordereauResponse>, ApiError> {
    request.validate()?;
    let updated = state
        .workflow
        .reject(BordereauId::from_uuid(id), request.reason, &actor)
        .await?;
    Ok(Json(BordereauResponse::from_entity(
        updated,
        state.workflow.now(),
    )))
}

/// Routes the file to a handler, by policy or by explicit pick
pub async fn assign(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignmentRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let outcome = state
        .assignments
        .assign(
            AssignRequest {
                bordereau_id: BordereauId::from_uuid(id),
                team_id: request.team_id.map(TeamId::from_uuid),
                policy: request.policy,
                assigned_to: request.assigned_to.map(UserId::from_uuid),
            },
            &actor,
        )
        .await?;
    Ok(Json(AssignmentResponse::from_outcome(
        outcome,
        state.workflow.now(),
    )))
}

/// Moves an actively held file to another handler
pub async fn reassign(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReassignmentRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    request.validate()?;
    let outcome = state
        .assignments
        .reassign(
            ReassignRequest {
                bordereau_id: BordereauId::from_uuid(id),
                team_id: request.team_id.map(TeamId::from_uuid),
                policy: request.policy,
                assigned_to: request.assigned_to.map(UserId::from_uuid),
                reason: request.reason,
            },
            &actor,
        )
        .await?;
    Ok(Json(AssignmentResponse::from_outcome(
        outcome,
        state.workflow.now(),
    )))
}

/// Archives the file out of every projection
pub async fn archive(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BordereauResponse>, ApiError> {
    let updated = state
        .workflow
        .archive(BordereauId::from_uuid(id), &actor)
        .await?;
    Ok(Json(BordereauResponse::from_entity(
        updated,
        state.workflow.now(),
    )))
}

/// Brings an archived file back
pub async fn restore(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BordereauResponse>, ApiError> {
    let updated = state
        .workflow
        .restore(BordereauId::from_uuid(id), &actor)
        .await?;
    Ok(Json(BordereauResponse::from_entity(
        updated,
        state.workflow.now(),
    )))
}

/// Registers a scanned slip under the bordereau
pub async fn attach_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    request.validate()?;
    let document = state
        .workflow
        .attach_document(BordereauId::from_uuid(id), request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// Slips attached to one bordereau
pub async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let documents = state
        .workflow
        .documents_for(BordereauId::from_uuid(id))
        .await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

/// Moves one slip along its coarse lifecycle
pub async fn update_document_statut(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDocumentStatutRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state
        .workflow
        .update_document_statut(DocumentId::from_uuid(id), request.statut)
        .await?;
    Ok(Json(document.into()))
}

/// Hands one slip to a handler
pub async fn assign_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state
        .workflow
        .assign_document(DocumentId::from_uuid(id), UserId::from_uuid(request.user_id))
        .await?;
    Ok(Json(document.into()))
}
