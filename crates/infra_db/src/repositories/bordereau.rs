//! Bordereau repository implementation
//!
//! Database access for bordereaux and their treatment history. The guarded
//! update is the concurrency backbone: entity write and history append
//! commit in one transaction, conditioned on the version the caller read.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const BORDEREAU_COLUMNS: &str = "id, reference, client_id, statut, priorite, nombre_bs, \
     delai_reglement, date_reception, date_debut_scan, date_fin_scan, date_reception_sante, \
     date_depot_virement, date_execution_virement, date_cloture, assigned_to, current_handler, \
     team_id, archived, version, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, bordereau_id, user_id, action, from_statut, to_statut, \
     assigned_to, reason, sweep_id, created_at";

/// Repository for bordereaux and their append-only history
#[derive(Debug, Clone)]
pub struct BordereauRepository {
    pool: PgPool,
}

impl BordereauRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a bordereau by its identifier
    ///
    /// # Returns
    ///
    /// The bordereau row or NotFound error
    pub async fn get_by_id(&self, id: Uuid) -> Result<BordereauRow, DatabaseError> {
        let sql = format!("SELECT {BORDEREAU_COLUMNS} FROM bordereaux WHERE id = $1");
        sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Bordereau", id))
    }

    /// True when the client already uses this reference
    pub async fn reference_exists(
        &self,
        client_id: Uuid,
        reference: &str,
    ) -> Result<bool, DatabaseError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bordereaux WHERE client_id = $1 AND reference = $2)",
        )
        .bind(client_id)
        .bind(reference)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Inserts a new bordereau together with its creation record, in one
    /// transaction
    pub async fn insert(
        &self,
        row: &BordereauRow,
        history: &HistoryRow,
    ) -> Result<BordereauRow, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO bordereaux ({BORDEREAU_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
              $18, $19, $20, $21) \
             RETURNING {BORDEREAU_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(row.id)
            .bind(&row.reference)
            .bind(row.client_id)
            .bind(&row.statut)
            .bind(&row.priorite)
            .bind(row.nombre_bs)
            .bind(row.delai_reglement)
            .bind(row.date_reception)
            .bind(row.date_debut_scan)
            .bind(row.date_fin_scan)
            .bind(row.date_reception_sante)
            .bind(row.date_depot_virement)
            .bind(row.date_execution_virement)
            .bind(row.date_cloture)
            .bind(row.assigned_to)
            .bind(row.current_handler)
            .bind(row.team_id)
            .bind(row.archived)
            .bind(row.version)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        append_history(&mut tx, history).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Writes an updated bordereau and appends one history record, both in
    /// one transaction, only if the stored version still equals
    /// `expected_version`
    ///
    /// # Returns
    ///
    /// The stored row with its version bumped, `VersionConflict` when the
    /// row moved underneath the caller, or NotFound when it is gone
    pub async fn update_guarded(
        &self,
        row: &BordereauRow,
        expected_version: i64,
        history: &HistoryRow,
    ) -> Result<BordereauRow, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE bordereaux SET \
                 statut = $3, priorite = $4, nombre_bs = $5, delai_reglement = $6, \
                 date_debut_scan = $7, date_fin_scan = $8, date_reception_sante = $9, \
                 date_depot_virement = $10, date_execution_virement = $11, date_cloture = $12, \
                 assigned_to = $13, current_handler = $14, team_id = $15, archived = $16, \
                 updated_at = $17, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {BORDEREAU_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(row.id)
            .bind(expected_version)
            .bind(&row.statut)
            .bind(&row.priorite)
            .bind(row.nombre_bs)
            .bind(row.delai_reglement)
            .bind(row.date_debut_scan)
            .bind(row.date_fin_scan)
            .bind(row.date_reception_sante)
            .bind(row.date_depot_virement)
            .bind(row.date_execution_virement)
            .bind(row.date_cloture)
            .bind(row.assigned_to)
            .bind(row.current_handler)
            .bind(row.team_id)
            .bind(row.archived)
            .bind(row.updated_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(updated) = updated else {
            // Zero rows matched: the row is gone or its version moved.
            let found: Option<i64> =
                sqlx::query_scalar("SELECT version FROM bordereaux WHERE id = $1")
                    .bind(row.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match found {
                Some(version) => DatabaseError::VersionConflict(format!(
                    "bordereau {} expected version {expected_version}, found {version}",
                    row.id
                )),
                None => DatabaseError::not_found("Bordereau", row.id),
            });
        };

        append_history(&mut tx, history).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Non-archived bordereaux currently in any of the given statuts,
    /// oldest first
    pub async fn list_by_statuts(
        &self,
        statuts: &[String],
    ) -> Result<Vec<BordereauRow>, DatabaseError> {
        let sql = format!(
            "SELECT {BORDEREAU_COLUMNS} FROM bordereaux \
             WHERE NOT archived AND statut = ANY($1) \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(statuts.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Non-archived bordereaux in the given statuts touched since `since`,
    /// most recent first, capped at `limit`
    pub async fn list_recently_updated(
        &self,
        statuts: &[String],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BordereauRow>, DatabaseError> {
        let sql = format!(
            "SELECT {BORDEREAU_COLUMNS} FROM bordereaux \
             WHERE NOT archived AND statut = ANY($1) AND updated_at >= $2 \
             ORDER BY updated_at DESC, id \
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(statuts.to_vec())
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// One keyset page of non-archived bordereaux outside the excluded
    /// statuts, ordered by id, strictly after `after`
    pub async fn page_open(
        &self,
        excluded_statuts: &[String],
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<BordereauRow>, DatabaseError> {
        let sql = format!(
            "SELECT {BORDEREAU_COLUMNS} FROM bordereaux \
             WHERE NOT archived AND statut <> ALL($1) AND ($2::uuid IS NULL OR id > $2) \
             ORDER BY id \
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, BordereauRow>(&sql)
            .bind(excluded_statuts.to_vec())
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Per-handler count of non-archived files in the given statuts
    ///
    /// Handlers holding nothing are absent from the result.
    pub async fn count_by_assignee(
        &self,
        users: &[Uuid],
        statuts: &[String],
    ) -> Result<Vec<HandlerCountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HandlerCountRow>(
            "SELECT assigned_to, COUNT(*) AS load FROM bordereaux \
             WHERE NOT archived AND assigned_to = ANY($1) AND statut = ANY($2) \
             GROUP BY assigned_to",
        )
        .bind(users.to_vec())
        .bind(statuts.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full history of one bordereau, oldest first (id as tiebreak)
    pub async fn history_for(&self, bordereau_id: Uuid) -> Result<Vec<HistoryRow>, DatabaseError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM traitement_history \
             WHERE bordereau_id = $1 \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(bordereau_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Appends one history record inside the caller's transaction
async fn append_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    history: &HistoryRow,
) -> Result<(), DatabaseError> {
    let sql = format!(
        "INSERT INTO traitement_history ({HISTORY_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    );
    sqlx::query(&sql)
        .bind(history.id)
        .bind(history.bordereau_id)
        .bind(history.user_id)
        .bind(&history.action)
        .bind(&history.from_statut)
        .bind(&history.to_statut)
        .bind(history.assigned_to)
        .bind(&history.reason)
        .bind(history.sweep_id)
        .bind(history.created_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Database row for a bordereau
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BordereauRow {
    pub id: Uuid,
    pub reference: String,
    pub client_id: Uuid,
    pub statut: String,
    pub priorite: String,
    pub nombre_bs: i32,
    pub delai_reglement: i64,
    pub date_reception: DateTime<Utc>,
    pub date_debut_scan: Option<DateTime<Utc>>,
    pub date_fin_scan: Option<DateTime<Utc>>,
    pub date_reception_sante: Option<DateTime<Utc>>,
    pub date_depot_virement: Option<DateTime<Utc>>,
    pub date_execution_virement: Option<DateTime<Utc>>,
    pub date_cloture: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub current_handler: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub archived: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a treatment history record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub bordereau_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub from_statut: Option<String>,
    pub to_statut: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reason: Option<String>,
    pub sweep_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One handler's current load
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HandlerCountRow {
    pub assigned_to: Uuid,
    pub load: i64,
}
