//! Directory repository implementation
//!
//! Read-only access to the user directory. The engine does not manage
//! accounts; it reads role, team link, capacity and the active flag, and
//! leaves every filter beyond membership to the domain layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, display_name, role, team_leader_id, capacity, active, created_at";

/// Repository for directory lookups
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a user by their identifier
    pub async fn get_by_id(&self, id: Uuid) -> Result<UserRow, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", id))
    }

    /// Everyone reporting to the given chef, active or not, in creation
    /// order
    pub async fn list_by_team_leader(&self, chef_id: Uuid) -> Result<Vec<UserRow>, DatabaseError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE team_leader_id = $1 \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(chef_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Every active chef d'equipe, in creation order
    pub async fn list_active_chefs(&self) -> Result<Vec<UserRow>, DatabaseError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE role = $1 AND active \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind("CHEF_EQUIPE")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Database row for a directory user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub display_name: String,
    pub role: String,
    pub team_leader_id: Option<Uuid>,
    pub capacity: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
