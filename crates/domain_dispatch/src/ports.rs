//! Dispatch domain ports
//!
//! The routing layer consumes directory data and team tuning through
//! these seams. `infra_db` provides the PostgreSQL adapters; `test_utils`
//! the in-memory ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, PortError, TeamId, UserId};

use crate::escalation::EscalationRule;
use crate::workload::{TeamWorkloadConfig, User};

/// Read access to the user directory
#[async_trait]
pub trait DirectoryPort: DomainPort {
    async fn get_user(&self, id: UserId) -> Result<User, PortError>;

    /// Everyone reporting to the team's chef, active or not, in one query
    ///
    /// Callers filter; membership is never re-derived per item.
    async fn team_members(&self, team_id: TeamId) -> Result<Vec<User>, PortError>;

    /// Active chefs d'equipe, each one anchoring a team
    async fn active_chefs(&self) -> Result<Vec<User>, PortError>;
}

/// Persistence for per-team routing configuration
#[async_trait]
pub trait TeamConfigStore: DomainPort {
    /// Stored config, or `None` when the team was never tuned
    async fn get(&self, team_id: TeamId) -> Result<Option<TeamWorkloadConfig>, PortError>;

    async fn upsert(&self, config: &TeamWorkloadConfig) -> Result<TeamWorkloadConfig, PortError>;

    /// Stored config or the defaults on first touch
    async fn get_or_default(
        &self,
        team_id: TeamId,
        now: DateTime<Utc>,
    ) -> Result<TeamWorkloadConfig, PortError> {
        Ok(self
            .get(team_id)
            .await?
            .unwrap_or_else(|| TeamWorkloadConfig::defaults(team_id, now)))
    }
}

/// Read access to the stored escalation rule set
///
/// Rules are operator data, not code. The sweeper takes whatever rule
/// vector it is built with; this seam is how the server obtains that
/// vector, falling back to [`EscalationRule::defaults`] when the store
/// holds none.
#[async_trait]
pub trait EscalationRuleStore: DomainPort {
    /// Active rules, oldest first
    async fn load_active(&self) -> Result<Vec<EscalationRule>, PortError>;
}
