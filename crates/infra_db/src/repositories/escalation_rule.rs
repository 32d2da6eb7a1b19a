//! Escalation rule repository
//!
//! Rules live as plain rows: operators insert or toggle them in SQL and
//! the server reads the active set at startup. The engine itself never
//! writes this table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const RULE_COLUMNS: &str = "id, name, condition, active";

/// Repository for stored escalation triggers
#[derive(Debug, Clone)]
pub struct EscalationRuleRepository {
    pool: PgPool,
}

impl EscalationRuleRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active rules, oldest first
    pub async fn list_active(&self) -> Result<Vec<EscalationRuleRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM escalation_rules WHERE active ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, EscalationRuleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Database row for an escalation rule
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EscalationRuleRow {
    pub id: Uuid,
    pub name: String,
    pub condition: serde_json::Value,
    pub active: bool,
}
