//! Team workload configuration repository
//!
//! One row per team, created lazily: a team without a row runs on domain
//! defaults and the upsert writes the first row when a chef tunes it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const CONFIG_COLUMNS: &str = "team_id, max_load, auto_reassign_enabled, overflow_action, \
     alert_threshold, round_robin_cursor, updated_by, updated_at";

/// Repository for per-team routing knobs
#[derive(Debug, Clone)]
pub struct TeamConfigRepository {
    pool: PgPool,
}

impl TeamConfigRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a team's config row, if one was ever written
    pub async fn get(&self, team_id: Uuid) -> Result<Option<TeamConfigRow>, DatabaseError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM team_workload_configs WHERE team_id = $1");
        let row = sqlx::query_as::<_, TeamConfigRow>(&sql)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Inserts or fully replaces a team's config row
    pub async fn upsert(&self, row: &TeamConfigRow) -> Result<TeamConfigRow, DatabaseError> {
        let sql = format!(
            "INSERT INTO team_workload_configs ({CONFIG_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (team_id) DO UPDATE SET \
                 max_load = EXCLUDED.max_load, \
                 auto_reassign_enabled = EXCLUDED.auto_reassign_enabled, \
                 overflow_action = EXCLUDED.overflow_action, \
                 alert_threshold = EXCLUDED.alert_threshold, \
                 round_robin_cursor = EXCLUDED.round_robin_cursor, \
                 updated_by = EXCLUDED.updated_by, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {CONFIG_COLUMNS}"
        );
        let written = sqlx::query_as::<_, TeamConfigRow>(&sql)
            .bind(row.team_id)
            .bind(row.max_load)
            .bind(row.auto_reassign_enabled)
            .bind(&row.overflow_action)
            .bind(row.alert_threshold)
            .bind(row.round_robin_cursor)
            .bind(row.updated_by)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(written)
    }
}

/// Database row for a team workload config
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamConfigRow {
    pub team_id: Uuid,
    pub max_load: i32,
    pub auto_reassign_enabled: bool,
    pub overflow_action: String,
    pub alert_threshold: i32,
    pub round_robin_cursor: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
