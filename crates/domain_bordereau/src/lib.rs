//! Bordereau workflow domain
//!
//! The aggregate and state machine of the claim-batch pipeline:
//! - [`statut`]: the closed status vocabulary and its static adjacency table
//! - [`bordereau`]: the aggregate, canonical timestamps and the pure
//!   transition function
//! - [`ownership`]: the assigned/handling pair with drift reconciliation
//! - [`history`]: the append-only audit trail records
//! - [`ports`]: persistence and notification seams
//! - [`services`]: orchestration over the guarded write

pub mod bordereau;
pub mod document;
pub mod error;
pub mod events;
pub mod history;
pub mod ownership;
pub mod ports;
pub mod services;
pub mod statut;

pub use bordereau::{compute_priorite, Bordereau, Priorite, TransitionCommand, TransitionOutcome};
pub use document::{Document, DocumentStatut};
pub use error::WorkflowError;
pub use events::{Audience, Notification, NotificationKind};
pub use history::{HistoryAction, TraitementHistory};
pub use ownership::{Ownership, OwnershipDrift};
pub use ports::{BordereauStore, DocumentStore, NotificationPort};
pub use services::{BordereauSla, CreateBordereau, WorkflowService};
pub use statut::{OwnershipEffect, StampSlot, Statut};
