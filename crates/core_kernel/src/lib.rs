//! Core Kernel - Foundational types for the bordereau workflow engine
//!
//! This crate provides the building blocks used across all domain modules:
//! - Strongly-typed identifiers for every entity kind
//! - Roles and the explicit [`actor::Actor`] carried by every mutation
//! - The SLA duration engine (pure calendar-day arithmetic)
//! - Port infrastructure (error vocabulary, clock, health checks)

pub mod actor;
pub mod error;
pub mod identifiers;
pub mod ports;
pub mod sla;

pub use actor::{Actor, Role};
pub use error::CoreError;
pub use identifiers::{
    BordereauId, ClientId, DocumentId, HistoryId, NotificationId, RuleId, SweepId, TeamId,
    UserId,
};
pub use ports::{
    AdapterHealth, Clock, DomainPort, HealthCheckResult, HealthCheckable, PortError, SystemClock,
};
pub use sla::{SlaReport, SlaStatus, DEFAULT_SLA_DAYS, WARNING_BAND_DAYS};
