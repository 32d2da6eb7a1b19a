//! PostgreSQL workflow adapters
//!
//! Bridges between the workflow domain ports and the repository layer:
//! [`PgBordereauStore`] implements `BordereauStore`, [`PgDocumentStore`]
//! implements `DocumentStore`. Both translate row types to domain types at
//! this boundary, so an unknown stored wire name surfaces as a
//! transformation error instead of a bad domain value.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, BordereauId, ClientId, DocumentId, DomainPort, HealthCheckResult,
    HealthCheckable, HistoryId, PortError, SweepId, TeamId, UserId,
};
use domain_bordereau::{
    Bordereau, BordereauStore, Document, DocumentStore, Ownership, Priorite, Statut,
    TraitementHistory,
};

use crate::error::DatabaseError;
use crate::repositories::bordereau::{BordereauRow, HistoryRow};
use crate::repositories::document::DocumentRow;
use crate::repositories::{BordereauRepository, DocumentRepository};

/// PostgreSQL-backed implementation of the `BordereauStore` port
#[derive(Debug, Clone)]
pub struct PgBordereauStore {
    repository: BordereauRepository,
    pool: PgPool,
}

impl PgBordereauStore {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BordereauRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &BordereauRepository {
        &self.repository
    }
}

impl DomainPort for PgBordereauStore {}

#[async_trait]
impl HealthCheckable for PgBordereauStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-bordereau-store").await
    }
}

#[async_trait]
impl BordereauStore for PgBordereauStore {
    #[instrument(skip(self), fields(bordereau_id = %id))]
    async fn get(&self, id: BordereauId) -> Result<Bordereau, PortError> {
        debug!("fetching bordereau");
        let row = self.repository.get_by_id(id.into()).await?;
        row_to_bordereau(row)
    }

    #[instrument(skip(self, reference), fields(client_id = %client_id))]
    async fn reference_exists(
        &self,
        client_id: ClientId,
        reference: &str,
    ) -> Result<bool, PortError> {
        let exists = self
            .repository
            .reference_exists(client_id.into(), reference)
            .await?;
        Ok(exists)
    }

    #[instrument(skip(self, bordereau, history), fields(bordereau_id = %bordereau.id))]
    async fn insert(
        &self,
        bordereau: &Bordereau,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError> {
        debug!(reference = %bordereau.reference, "inserting bordereau");
        let row = self
            .repository
            .insert(&bordereau_to_row(bordereau), &history_to_row(history))
            .await?;
        row_to_bordereau(row)
    }

    #[instrument(
        skip(self, bordereau, history),
        fields(bordereau_id = %bordereau.id, expected_version)
    )]
    async fn update_guarded(
        &self,
        bordereau: &Bordereau,
        expected_version: i64,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError> {
        debug!(statut = bordereau.statut.as_str(), "guarded write");
        let row = self
            .repository
            .update_guarded(
                &bordereau_to_row(bordereau),
                expected_version,
                &history_to_row(history),
            )
            .await?;
        row_to_bordereau(row)
    }

    #[instrument(skip(self, statuts), fields(statut_count = statuts.len()))]
    async fn list_by_statuts(&self, statuts: &[Statut]) -> Result<Vec<Bordereau>, PortError> {
        let rows = self.repository.list_by_statuts(&statut_names(statuts)).await?;
        rows.into_iter().map(row_to_bordereau).collect()
    }

    #[instrument(skip(self, statuts), fields(statut_count = statuts.len(), limit))]
    async fn list_recently_updated(
        &self,
        statuts: &[Statut],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError> {
        let rows = self
            .repository
            .list_recently_updated(&statut_names(statuts), since, limit)
            .await?;
        rows.into_iter().map(row_to_bordereau).collect()
    }

    #[instrument(skip(self), fields(limit))]
    async fn page_open(
        &self,
        after: Option<BordereauId>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError> {
        let excluded: Vec<String> = Statut::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.as_str().to_string())
            .collect();
        let rows = self
            .repository
            .page_open(&excluded, after.map(Into::into), limit)
            .await?;
        rows.into_iter().map(row_to_bordereau).collect()
    }

    #[instrument(skip(self, users), fields(user_count = users.len()))]
    async fn count_active_for(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, i64>, PortError> {
        let ids: Vec<_> = users.iter().copied().map(Into::into).collect();
        let active: Vec<String> = Statut::ALL
            .iter()
            .filter(|s| s.is_active_handling())
            .map(|s| s.as_str().to_string())
            .collect();
        let rows = self.repository.count_by_assignee(&ids, &active).await?;
        Ok(rows
            .into_iter()
            .map(|r| (UserId::from(r.assigned_to), r.load))
            .collect())
    }

    #[instrument(skip(self), fields(bordereau_id = %id))]
    async fn history_for(&self, id: BordereauId) -> Result<Vec<TraitementHistory>, PortError> {
        let rows = self.repository.history_for(id.into()).await?;
        rows.into_iter().map(row_to_history).collect()
    }
}

/// PostgreSQL-backed implementation of the `DocumentStore` port
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    repository: DocumentRepository,
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: DocumentRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PgDocumentStore {}

#[async_trait]
impl HealthCheckable for PgDocumentStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-document-store").await
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    async fn insert(&self, document: &Document) -> Result<Document, PortError> {
        debug!(bordereau_id = %document.bordereau_id, "inserting document");
        let row = self.repository.insert(&document_to_row(document)).await?;
        row_to_document(row)
    }

    #[instrument(skip(self), fields(document_id = %id))]
    async fn get(&self, id: DocumentId) -> Result<Document, PortError> {
        let row = self.repository.get_by_id(id.into()).await?;
        row_to_document(row)
    }

    #[instrument(skip(self, document), fields(document_id = %document.id))]
    async fn update(&self, document: &Document) -> Result<Document, PortError> {
        let row = self.repository.update(&document_to_row(document)).await?;
        row_to_document(row)
    }

    #[instrument(skip(self), fields(bordereau_id = %bordereau_id))]
    async fn list_for(&self, bordereau_id: BordereauId) -> Result<Vec<Document>, PortError> {
        let rows = self.repository.list_for(bordereau_id.into()).await?;
        rows.into_iter().map(row_to_document).collect()
    }

    #[instrument(skip(self), fields(bordereau_id = %bordereau_id))]
    async fn count_for(&self, bordereau_id: BordereauId) -> Result<i64, PortError> {
        let count = self.repository.count_for(bordereau_id.into()).await?;
        Ok(count)
    }

    #[instrument(skip(self, bordereau_ids), fields(bordereau_count = bordereau_ids.len()))]
    async fn count_for_many(
        &self,
        bordereau_ids: &[BordereauId],
    ) -> Result<HashMap<BordereauId, i64>, PortError> {
        let ids: Vec<_> = bordereau_ids.iter().copied().map(Into::into).collect();
        let rows = self.repository.count_for_many(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| (BordereauId::from(r.bordereau_id), r.count))
            .collect())
    }
}

// =============================================================================
// Conversion Functions
// =============================================================================

/// Shared SELECT 1 health probe
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("database error: {e}")),
            checked_at: Utc::now(),
        },
    }
}

/// Parses a wire name stored in a TEXT column back into its vocabulary
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, PortError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| PortError::from(DatabaseError::mapping(column, e)))
}

fn statut_names(statuts: &[Statut]) -> Vec<String> {
    statuts.iter().map(|s| s.as_str().to_string()).collect()
}

fn row_to_bordereau(row: BordereauRow) -> Result<Bordereau, PortError> {
    let statut = parse_column::<Statut>(&row.statut, "statut")?;
    let priorite = parse_column::<Priorite>(&row.priorite, "priorite")?;

    Ok(Bordereau {
        id: BordereauId::from(row.id),
        reference: row.reference,
        client_id: ClientId::from(row.client_id),
        statut,
        priorite,
        nombre_bs: row.nombre_bs,
        delai_reglement: row.delai_reglement,
        date_reception: row.date_reception,
        date_debut_scan: row.date_debut_scan,
        date_fin_scan: row.date_fin_scan,
        date_reception_sante: row.date_reception_sante,
        date_depot_virement: row.date_depot_virement,
        date_execution_virement: row.date_execution_virement,
        date_cloture: row.date_cloture,
        ownership: Ownership::from_columns(
            row.assigned_to.map(UserId::from),
            row.current_handler.map(UserId::from),
        ),
        team_id: row.team_id.map(TeamId::from),
        archived: row.archived,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn bordereau_to_row(bordereau: &Bordereau) -> BordereauRow {
    BordereauRow {
        id: bordereau.id.into(),
        reference: bordereau.reference.clone(),
        client_id: bordereau.client_id.into(),
        statut: bordereau.statut.as_str().to_string(),
        priorite: bordereau.priorite.as_str().to_string(),
        nombre_bs: bordereau.nombre_bs,
        delai_reglement: bordereau.delai_reglement,
        date_reception: bordereau.date_reception,
        date_debut_scan: bordereau.date_debut_scan,
        date_fin_scan: bordereau.date_fin_scan,
        date_reception_sante: bordereau.date_reception_sante,
        date_depot_virement: bordereau.date_depot_virement,
        date_execution_virement: bordereau.date_execution_virement,
        date_cloture: bordereau.date_cloture,
        assigned_to: bordereau.ownership.assigned_to().map(Into::into),
        current_handler: bordereau.ownership.current_handler().map(Into::into),
        team_id: bordereau.team_id.map(Into::into),
        archived: bordereau.archived,
        version: bordereau.version,
        created_at: bordereau.created_at,
        updated_at: bordereau.updated_at,
    }
}

fn row_to_history(row: HistoryRow) -> Result<TraitementHistory, PortError> {
    let action = parse_column(&row.action, "action")?;
    let from_statut = row
        .from_statut
        .as_deref()
        .map(|s| parse_column::<Statut>(s, "from_statut"))
        .transpose()?;
    let to_statut = row
        .to_statut
        .as_deref()
        .map(|s| parse_column::<Statut>(s, "to_statut"))
        .transpose()?;

    Ok(TraitementHistory {
        id: HistoryId::from(row.id),
        bordereau_id: BordereauId::from(row.bordereau_id),
        user_id: UserId::from(row.user_id),
        action,
        from_statut,
        to_statut,
        assigned_to: row.assigned_to.map(UserId::from),
        reason: row.reason,
        sweep_id: row.sweep_id.map(SweepId::from),
        created_at: row.created_at,
    })
}

fn history_to_row(history: &TraitementHistory) -> HistoryRow {
    HistoryRow {
        id: history.id.into(),
        bordereau_id: history.bordereau_id.into(),
        user_id: history.user_id.into(),
        action: history.action.as_str().to_string(),
        from_statut: history.from_statut.map(|s| s.as_str().to_string()),
        to_statut: history.to_statut.map(|s| s.as_str().to_string()),
        assigned_to: history.assigned_to.map(Into::into),
        reason: history.reason.clone(),
        sweep_id: history.sweep_id.map(Into::into),
        created_at: history.created_at,
    }
}

fn row_to_document(row: DocumentRow) -> Result<Document, PortError> {
    let statut = parse_column(&row.statut, "document statut")?;
    Ok(Document {
        id: DocumentId::from(row.id),
        bordereau_id: BordereauId::from(row.bordereau_id),
        name: row.name,
        statut,
        assigned_to: row.assigned_to.map(UserId::from),
        uploaded_at: row.uploaded_at,
        updated_at: row.updated_at,
    })
}

fn document_to_row(document: &Document) -> DocumentRow {
    DocumentRow {
        id: document.id.into(),
        bordereau_id: document.bordereau_id.into(),
        name: document.name.clone(),
        statut: document.statut.as_str().to_string(),
        assigned_to: document.assigned_to.map(Into::into),
        uploaded_at: document.uploaded_at,
        updated_at: document.updated_at,
    }
}
