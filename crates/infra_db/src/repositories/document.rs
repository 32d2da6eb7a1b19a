//! Document repository implementation
//!
//! Database access for the scanned slips linked to a bordereau. The linked
//! count here, not the declared `nombre_bs`, is what workload math trusts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const DOCUMENT_COLUMNS: &str = "id, bordereau_id, name, statut, assigned_to, uploaded_at, updated_at";

/// Repository for scanned claim slips
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a document by its identifier
    pub async fn get_by_id(&self, id: Uuid) -> Result<DocumentRow, DatabaseError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Document", id))
    }

    /// Inserts a freshly scanned slip
    pub async fn insert(&self, row: &DocumentRow) -> Result<DocumentRow, DatabaseError> {
        let sql = format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(row.id)
            .bind(row.bordereau_id)
            .bind(&row.name)
            .bind(&row.statut)
            .bind(row.assigned_to)
            .bind(row.uploaded_at)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(inserted)
    }

    /// Writes a slip's mutable columns back
    pub async fn update(&self, row: &DocumentRow) -> Result<DocumentRow, DatabaseError> {
        let sql = format!(
            "UPDATE documents SET name = $2, statut = $3, assigned_to = $4, updated_at = $5 \
             WHERE id = $1 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.statut)
            .bind(row.assigned_to)
            .bind(row.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Document", row.id))
    }

    /// All slips of one bordereau, oldest first
    pub async fn list_for(&self, bordereau_id: Uuid) -> Result<Vec<DocumentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE bordereau_id = $1 \
             ORDER BY uploaded_at, id"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(bordereau_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Linked-slip count for one bordereau
    pub async fn count_for(&self, bordereau_id: Uuid) -> Result<i64, DatabaseError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE bordereau_id = $1")
                .bind(bordereau_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Linked-slip counts for a whole set of bordereaux in one query
    ///
    /// Bordereaux without slips are absent from the result.
    pub async fn count_for_many(
        &self,
        bordereau_ids: &[Uuid],
    ) -> Result<Vec<DocumentCountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentCountRow>(
            "SELECT bordereau_id, COUNT(*) AS count FROM documents \
             WHERE bordereau_id = ANY($1) \
             GROUP BY bordereau_id",
        )
        .bind(bordereau_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Database row for a document
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub bordereau_id: Uuid,
    pub name: String,
    pub statut: String,
    pub assigned_to: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slip count of one bordereau
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentCountRow {
    pub bordereau_id: Uuid,
    pub count: i64,
}
