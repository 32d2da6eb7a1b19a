//! Team workload and configuration handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Actor, TeamId};
use domain_dispatch::services::ConfigUpdate;
use domain_dispatch::{TeamWorkload, TeamWorkloadConfig};

use crate::dto::dispatch::TeamConfigRequest;
use crate::{error::ApiError, AppState};

/// Current load picture of one team
pub async fn get_workload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamWorkload>, ApiError> {
    let workload = state.assignments.team_workload(TeamId::from_uuid(id)).await?;
    Ok(Json(workload))
}

/// Stored or default config of one team
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamWorkloadConfig>, ApiError> {
    let config = state.assignments.team_config(TeamId::from_uuid(id)).await?;
    Ok(Json(config))
}

/// Replaces the tunable fields of a team config
pub async fn put_config(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<TeamConfigRequest>,
) -> Result<Json<TeamWorkloadConfig>, ApiError> {
    request.validate()?;
    let config = state
        .assignments
        .put_team_config(
            TeamId::from_uuid(id),
            ConfigUpdate {
                max_load: request.max_load,
                auto_reassign_enabled: request.auto_reassign_enabled,
                overflow_action: request.overflow_action,
                alert_threshold: request.alert_threshold,
            },
            &actor,
        )
        .await?;
    Ok(Json(config))
}
