//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the bordereau engine, built on SQLx.
//!
//! # Architecture
//!
//! Two layers: repositories own the SQL and the row types; adapters
//! implement the domain ports on top of them and translate rows into
//! domain types at the boundary. Statuses, roles, actions and policies
//! are stored as their wire names and parsed back through the domain
//! vocabularies, so a corrupt value fails as a transformation error.
//!
//! The bordereau aggregate is written exclusively through the guarded
//! update: entity write and history append commit in one transaction,
//! conditioned on the version the caller read.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgBordereauStore};
//!
//! let pool = create_pool(DatabaseConfig::new(&url)).await?;
//! run_migrations(&pool).await?;
//! let store = PgBordereauStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{
    PgBordereauStore, PgDirectory, PgDocumentStore, PgEscalationRuleStore, PgNotificationOutbox,
    PgTeamConfigStore,
};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
