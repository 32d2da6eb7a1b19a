//! Domain Adapters
//!
//! Adapter implementations for the domain ports, connecting the workflow
//! and dispatch interfaces to the PostgreSQL repository layer.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements one domain port trait
//! - Translates rows to domain types (and back) at the boundary
//! - Reports its own health through a `SELECT 1` probe
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PgBordereauStore;
//! use domain_bordereau::BordereauStore;
//!
//! let store = PgBordereauStore::new(pool);
//! let bordereau = store.get(id).await?;
//! ```

pub mod bordereau;
pub mod dispatch;
pub mod notification;

pub use bordereau::{PgBordereauStore, PgDocumentStore};
pub use dispatch::{PgDirectory, PgEscalationRuleStore, PgTeamConfigStore};
pub use notification::PgNotificationOutbox;
