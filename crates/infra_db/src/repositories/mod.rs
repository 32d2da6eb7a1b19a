//! Repository implementations for domain entities
//!
//! Concrete database access per aggregate. Repositories encapsulate SQL
//! and the row types; they never see domain enums, which the adapter layer
//! parses at the boundary.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Wire-name TEXT columns for closed vocabularies
//! - Transaction support where entity and history commit together
//! - Optimistic concurrency control on the bordereau aggregate

pub mod bordereau;
pub mod directory;
pub mod document;
pub mod escalation_rule;
pub mod team_config;

pub use bordereau::BordereauRepository;
pub use directory::DirectoryRepository;
pub use document::DocumentRepository;
pub use escalation_rule::EscalationRuleRepository;
pub use team_config::TeamConfigRepository;
