//! PostgreSQL dispatch adapters
//!
//! [`PgDirectory`] implements `DirectoryPort` over the users table,
//! [`PgTeamConfigStore`] implements `TeamConfigStore` over the per-team
//! routing knobs and [`PgEscalationRuleStore`] reads the stored sweep
//! rules.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, PortError, Role, RuleId, TeamId, UserId,
};
use domain_dispatch::{
    AssignmentPolicy, DirectoryPort, EscalationRule, EscalationRuleStore, TeamConfigStore,
    TeamWorkloadConfig, User,
};

use crate::adapters::bordereau::{parse_column, ping};
use crate::error::DatabaseError;
use crate::repositories::directory::UserRow;
use crate::repositories::escalation_rule::EscalationRuleRow;
use crate::repositories::team_config::TeamConfigRow;
use crate::repositories::{DirectoryRepository, EscalationRuleRepository, TeamConfigRepository};

/// PostgreSQL-backed implementation of the `DirectoryPort`
#[derive(Debug, Clone)]
pub struct PgDirectory {
    repository: DirectoryRepository,
    pool: PgPool,
}

impl PgDirectory {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: DirectoryRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PgDirectory {}

#[async_trait]
impl HealthCheckable for PgDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-directory").await
    }
}

#[async_trait]
impl DirectoryPort for PgDirectory {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: UserId) -> Result<User, PortError> {
        let row = self.repository.get_by_id(id.into()).await?;
        row_to_user(row)
    }

    #[instrument(skip(self), fields(team_id = %team_id))]
    async fn team_members(&self, team_id: TeamId) -> Result<Vec<User>, PortError> {
        debug!("listing team members");
        let rows = self
            .repository
            .list_by_team_leader(team_id.chef_id().into())
            .await?;
        rows.into_iter().map(row_to_user).collect()
    }

    #[instrument(skip(self))]
    async fn active_chefs(&self) -> Result<Vec<User>, PortError> {
        let rows = self.repository.list_active_chefs().await?;
        rows.into_iter().map(row_to_user).collect()
    }
}

/// PostgreSQL-backed implementation of the `TeamConfigStore`
#[derive(Debug, Clone)]
pub struct PgTeamConfigStore {
    repository: TeamConfigRepository,
    pool: PgPool,
}

impl PgTeamConfigStore {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TeamConfigRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PgTeamConfigStore {}

#[async_trait]
impl HealthCheckable for PgTeamConfigStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-team-config").await
    }
}

#[async_trait]
impl TeamConfigStore for PgTeamConfigStore {
    #[instrument(skip(self), fields(team_id = %team_id))]
    async fn get(&self, team_id: TeamId) -> Result<Option<TeamWorkloadConfig>, PortError> {
        let row = self.repository.get(team_id.into()).await?;
        row.map(row_to_config).transpose()
    }

    #[instrument(skip(self, config), fields(team_id = %config.team_id))]
    async fn upsert(&self, config: &TeamWorkloadConfig) -> Result<TeamWorkloadConfig, PortError> {
        debug!(max_load = config.max_load, "writing team config");
        let row = self.repository.upsert(&config_to_row(config)).await?;
        row_to_config(row)
    }
}

/// PostgreSQL-backed implementation of the `EscalationRuleStore`
#[derive(Debug, Clone)]
pub struct PgEscalationRuleStore {
    repository: EscalationRuleRepository,
    pool: PgPool,
}

impl PgEscalationRuleStore {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: EscalationRuleRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PgEscalationRuleStore {}

#[async_trait]
impl HealthCheckable for PgEscalationRuleStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-escalation-rules").await
    }
}

#[async_trait]
impl EscalationRuleStore for PgEscalationRuleStore {
    #[instrument(skip(self))]
    async fn load_active(&self) -> Result<Vec<EscalationRule>, PortError> {
        let rows = self.repository.list_active().await?;
        rows.into_iter().map(row_to_rule).collect()
    }
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn row_to_user(row: UserRow) -> Result<User, PortError> {
    let role = parse_column::<Role>(&row.role, "role")?;
    Ok(User {
        id: UserId::from(row.id),
        display_name: row.display_name,
        role,
        team_leader_id: row.team_leader_id.map(UserId::from),
        capacity: row.capacity,
        active: row.active,
        created_at: row.created_at,
    })
}

fn row_to_config(row: TeamConfigRow) -> Result<TeamWorkloadConfig, PortError> {
    let overflow_action = parse_column::<AssignmentPolicy>(&row.overflow_action, "overflow_action")?;
    Ok(TeamWorkloadConfig {
        team_id: TeamId::from(row.team_id),
        max_load: row.max_load,
        auto_reassign_enabled: row.auto_reassign_enabled,
        overflow_action,
        alert_threshold: row.alert_threshold,
        round_robin_cursor: row.round_robin_cursor.map(UserId::from),
        updated_by: row.updated_by.map(UserId::from),
        updated_at: row.updated_at,
    })
}

fn config_to_row(config: &TeamWorkloadConfig) -> TeamConfigRow {
    TeamConfigRow {
        team_id: config.team_id.into(),
        max_load: config.max_load,
        auto_reassign_enabled: config.auto_reassign_enabled,
        overflow_action: config.overflow_action.as_str().to_string(),
        alert_threshold: config.alert_threshold,
        round_robin_cursor: config.round_robin_cursor.map(Into::into),
        updated_by: config.updated_by.map(Into::into),
        updated_at: config.updated_at,
    }
}

fn row_to_rule(row: EscalationRuleRow) -> Result<EscalationRule, PortError> {
    let condition = serde_json::from_value(row.condition)
        .map_err(|e| PortError::from(DatabaseError::mapping("condition", e)))?;
    Ok(EscalationRule {
        id: RuleId::from(row.id),
        name: row.name,
        condition,
        active: row.active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_user_row_round_trip() {
        let chef = UserId::new();
        let row = UserRow {
            id: *UserId::new().as_uuid(),
            display_name: "A. Gestionnaire".to_string(),
            role: "GESTIONNAIRE_SENIOR".to_string(),
            team_leader_id: Some(*chef.as_uuid()),
            capacity: Some(25),
            active: true,
            created_at: Utc::now(),
        };

        let user = row_to_user(row).unwrap();
        assert_eq!(user.role, Role::GestionnaireSenior);
        assert!(user.belongs_to(TeamId::from_chef(chef)));
        assert!(user.is_assignable_handler());
    }

    #[test]
    fn test_unknown_role_fails_loudly() {
        let row = UserRow {
            id: *UserId::new().as_uuid(),
            display_name: "X".to_string(),
            role: "INTERN".to_string(),
            team_leader_id: None,
            capacity: None,
            active: true,
            created_at: Utc::now(),
        };
        assert!(row_to_user(row).is_err());
    }

    #[test]
    fn test_config_row_round_trip() {
        let config = TeamWorkloadConfig::defaults(TeamId::new(), Utc::now());
        let row = config_to_row(&config);
        assert_eq!(row.overflow_action, "LOWEST_LOAD");

        let back = row_to_config(row).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rule_row_round_trip() {
        let rule = EscalationRule::new(
            "echeance proche",
            domain_dispatch::RuleCondition::ApproachingDeadline { within_days: 3 },
        );
        let row = EscalationRuleRow {
            id: *rule.id.as_uuid(),
            name: rule.name.clone(),
            condition: serde_json::to_value(&rule.condition).unwrap(),
            active: rule.active,
        };

        let back = row_to_rule(row).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_unknown_rule_condition_fails_loudly() {
        let row = EscalationRuleRow {
            id: *RuleId::new_v7().as_uuid(),
            name: "x".to_string(),
            condition: serde_json::json!({ "kind": "FULL_MOON" }),
            active: true,
        };
        assert!(row_to_rule(row).is_err());
    }
}
