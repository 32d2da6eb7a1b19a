//! HTTP API Layer
//!
//! This crate provides the REST API for the bordereau workflow engine
//! using Axum, plus the scheduled escalation sweep that shares the same
//! service graph.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers over the workflow and dispatch services
//! - **Middleware**: Authentication, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//! - **Sweep**: Background escalation loop
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod sweep;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_bordereau::services::WorkflowService;
use domain_dispatch::{AssignmentService, CorbeilleService, EscalationSweeper};

use crate::config::ApiConfig;
use crate::handlers::{bordereaux, corbeille, escalations, health, teams};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub workflow: Arc<WorkflowService>,
    pub assignments: Arc<AssignmentService>,
    pub corbeilles: Arc<CorbeilleService>,
    pub sweeper: Arc<EscalationSweeper>,
    /// Storage probe behind the readiness endpoint
    pub health: Arc<dyn HealthCheckable>,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Shared services and configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Bordereau routes
    let bordereau_routes = Router::new()
        .route("/", post(bordereaux::create_bordereau))
        .route("/", get(bordereaux::list_bordereaux))
        .route("/:id", get(bordereaux::get_bordereau))
        .route("/:id/history", get(bordereaux::get_history))
        .route("/:id/sla", get(bordereaux::get_sla))
        .route("/:id/transition", post(bordereaux::transition))
        .route("/:id/reject", post(bordereaux::reject))
        .route("/:id/assign", post(bordereaux::assign))
        .route("/:id/reassign", post(bordereaux::reassign))
        .route("/:id/archive", post(bordereaux::archive))
        .route("/:id/restore", post(bordereaux::restore))
        .route("/:id/documents", post(bordereaux::attach_document))
        .route("/:id/documents", get(bordereaux::list_documents));

    // Document routes
    let document_routes = Router::new()
        .route("/:id/statut", put(bordereaux::update_document_statut))
        .route("/:id/assign", post(bordereaux::assign_document));

    // Corbeille routes
    let corbeille_routes = Router::new()
        .route("/", get(corbeille::get_corbeille))
        .route("/bulk-assign", post(corbeille::bulk_assign));

    // Team routes
    let team_routes = Router::new()
        .route("/:id/workload", get(teams::get_workload))
        .route("/:id/config", get(teams::get_config))
        .route("/:id/config", put(teams::put_config));

    // Escalation routes
    let escalation_routes = Router::new().route("/sweep", post(escalations::run_sweep));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/bordereaux", bordereau_routes)
        .nest("/documents", document_routes)
        .nest("/corbeille", corbeille_routes)
        .nest("/teams", team_routes)
        .nest("/escalations", escalation_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
