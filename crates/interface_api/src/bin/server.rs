//! Bordereau Workflow Engine - API Server Binary
//!
//! This binary starts the HTTP API server and the scheduled escalation
//! sweep for the bordereau workflow engine.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin bordereau-api
//!
//! # Run with environment variables
//! API_HOST=0.0.0.0 API_PORT=8080 DATABASE_URL=postgres://... cargo run --bin bordereau-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_SWEEP_INTERVAL_SECS` - Seconds between escalation sweeps, 0 disables (default: 3600)
//! * `API_SWEEP_BATCH_SIZE` - Open files fetched per sweep batch (default: 100)
//! * `API_CORBEILLE_WINDOW_DAYS` - Trailing window of the completed bucket (default: 7)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::SystemClock;
use domain_bordereau::services::WorkflowService;
use domain_dispatch::{
    AssignmentService, CorbeilleService, EscalationRule, EscalationRuleStore, EscalationSweeper,
};
use infra_db::{
    PgBordereauStore, PgDirectory, PgDocumentStore, PgEscalationRuleStore, PgNotificationOutbox,
    PgTeamConfigStore,
};
use interface_api::{config::ApiConfig, create_router, sweep, AppState};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, establishes the database
/// connection, wires the service graph and starts the HTTP server plus
/// the sweep loop.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - Database connection or migrations fail
/// - Server fails to bind to the configured address
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = load_config()?;

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Bordereau Workflow Engine API Server"
    );

    // Create database connection pool and apply migrations
    tracing::info!("Connecting to database...");
    let pool = infra_db::create_pool_from_url(&config.database_url).await?;
    tracing::info!("Running database migrations...");
    infra_db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    // Wire adapters and services
    let store = Arc::new(PgBordereauStore::new(pool.clone()));
    let documents = Arc::new(PgDocumentStore::new(pool.clone()));
    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let team_configs = Arc::new(PgTeamConfigStore::new(pool.clone()));
    let notifier = Arc::new(PgNotificationOutbox::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let workflow = Arc::new(WorkflowService::new(
        store.clone(),
        documents.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let assignments = Arc::new(AssignmentService::new(
        store.clone(),
        directory.clone(),
        team_configs.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let corbeilles = Arc::new(
        CorbeilleService::new(
            store.clone(),
            documents.clone(),
            directory.clone(),
            clock.clone(),
        )
        .with_completed_window(config.corbeille_window_days),
    );
    // Escalation rules are operator data; fall back to the stock set
    // when the table holds none.
    let rule_store = PgEscalationRuleStore::new(pool.clone());
    let mut rules = rule_store.load_active().await?;
    if rules.is_empty() {
        rules = EscalationRule::defaults();
    }
    tracing::info!(rules = rules.len(), "Escalation rules loaded");

    let sweeper = Arc::new(EscalationSweeper::new(
        store.clone(),
        notifier.clone(),
        clock,
        rules,
        config.sweep_batch_size,
    ));

    let state = AppState {
        config: config.clone(),
        workflow,
        assignments,
        corbeilles,
        sweeper: sweeper.clone(),
        health: store,
    };

    // Start the scheduled escalation sweep
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_task = tokio::spawn(sweep::run_sweep_loop(
        sweeper,
        config.sweep_interval_secs,
        shutdown_rx,
    ));

    // Create the API router
    let app = create_router(state);

    // Parse server address
    let addr: SocketAddr = config.server_addr().parse()?;

    tracing::info!(%addr, "Server listening");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep loop before exiting
    let _ = shutdown_tx.send(true);
    let _ = sweep_task.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads API configuration from environment variables.
///
/// Falls back to default values if environment variables are not set.
///
/// # Returns
///
/// `ApiConfig` populated from environment or defaults
fn load_config() -> Result<ApiConfig, Box<dyn std::error::Error>> {
    let mut config = ApiConfig::from_env().unwrap_or_default();
    // DATABASE_URL without the API_ prefix is the conventional override.
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    Ok(config)
}

/// Initializes the tracing subscriber for structured logging.
///
/// # Arguments
///
/// * `log_level` - The minimum log level to output (trace, debug, info, warn, error)
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
