//! Workflow domain ports
//!
//! The persistence and notification seams of the engine. Adapters provide
//! the implementations:
//!
//! - **PostgreSQL** (`infra_db`) for production
//! - **In-memory** (`test_utils`) for unit and service tests
//!
//! The guarded-write contract is the concurrency backbone: every mutation
//! of a bordereau goes through [`BordereauStore::update_guarded`], which
//! persists the entity and appends its history record in one transaction,
//! conditioned on the version the caller read. A lost race surfaces as
//! `PortError::Conflict` and never overwrites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use core_kernel::{BordereauId, ClientId, DomainPort, PortError, UserId};

use crate::bordereau::Bordereau;
use crate::document::Document;
use crate::events::Notification;
use crate::history::TraitementHistory;
use crate::statut::Statut;

/// Persistence boundary for bordereaux and their history
#[async_trait]
pub trait BordereauStore: DomainPort {
    /// Loads one bordereau
    async fn get(&self, id: BordereauId) -> Result<Bordereau, PortError>;

    /// True when the client already uses this reference
    async fn reference_exists(&self, client_id: ClientId, reference: &str)
        -> Result<bool, PortError>;

    /// Inserts a new bordereau together with its creation record
    async fn insert(
        &self,
        bordereau: &Bordereau,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError>;

    /// Writes an updated bordereau and appends one history record, both in
    /// one transaction, only if the stored version still equals
    /// `expected_version`. Returns the stored entity (version bumped) or
    /// `PortError::Conflict` when the row moved underneath the caller.
    async fn update_guarded(
        &self,
        bordereau: &Bordereau,
        expected_version: i64,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError>;

    /// Non-archived bordereaux currently in any of the given statuts
    async fn list_by_statuts(&self, statuts: &[Statut]) -> Result<Vec<Bordereau>, PortError>;

    /// Non-archived bordereaux in the given statuts touched since `since`,
    /// most recent first, capped at `limit`
    async fn list_recently_updated(
        &self,
        statuts: &[Statut],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError>;

    /// One keyset page of open (non-terminal, non-archived) bordereaux,
    /// ordered by id, strictly after `after`
    ///
    /// The sweep walks these pages so it never holds the whole set.
    async fn page_open(
        &self,
        after: Option<BordereauId>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError>;

    /// Current load per handler: non-archived files in the active-handling
    /// statuts, grouped by assignee. Absent users count zero.
    async fn count_active_for(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, i64>, PortError>;

    /// Full history of one bordereau, oldest first
    async fn history_for(&self, id: BordereauId) -> Result<Vec<TraitementHistory>, PortError>;
}

/// Persistence boundary for the scanned slips under a bordereau
#[async_trait]
pub trait DocumentStore: DomainPort {
    async fn insert(&self, document: &Document) -> Result<Document, PortError>;

    async fn get(&self, id: core_kernel::DocumentId) -> Result<Document, PortError>;

    async fn update(&self, document: &Document) -> Result<Document, PortError>;

    /// All slips of one bordereau, oldest first
    async fn list_for(&self, bordereau_id: BordereauId) -> Result<Vec<Document>, PortError>;

    /// Actual linked-slip count; authoritative for workload math
    async fn count_for(&self, bordereau_id: BordereauId) -> Result<i64, PortError>;

    /// Slip counts for a whole projection in one round trip; absent ids
    /// count zero
    async fn count_for_many(
        &self,
        bordereau_ids: &[BordereauId],
    ) -> Result<HashMap<BordereauId, i64>, PortError>;
}

/// Outbound notification seam
///
/// Delivery is someone else's business; publishing must be cheap and must
/// not fail a workflow mutation (adapters log and swallow carrier errors).
#[async_trait]
pub trait NotificationPort: DomainPort {
    async fn publish(&self, notification: Notification) -> Result<(), PortError>;
}
