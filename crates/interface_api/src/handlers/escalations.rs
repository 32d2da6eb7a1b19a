//! Escalation sweep handlers

use axum::{extract::State, Extension, Json};
use tracing::info;

use core_kernel::Actor;
use domain_dispatch::SweepReport;

use crate::{error::ApiError, AppState};

/// Runs one escalation sweep on demand
///
/// The same sweeper instance backs the scheduled loop; an overlapping
/// request answers 409 instead of running twice.
pub async fn run_sweep(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<SweepReport>, ApiError> {
    if !actor.role.leads_team() {
        return Err(ApiError::Forbidden(format!(
            "role {} may not trigger a sweep",
            actor.role
        )));
    }
    let report = state.sweeper.run_sweep().await?;
    info!(
        sweep_id = %report.sweep_id,
        scanned = report.scanned,
        escalated = report.escalated,
        "on-demand sweep finished"
    );
    Ok(Json(report))
}
