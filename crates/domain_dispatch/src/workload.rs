//! Directory data and team workload
//!
//! The engine does not own user management; it consumes directory rows
//! through [`crate::ports::DirectoryPort`] and keeps only what routing
//! needs: role, team link, capacity and the active flag. Team-level tuning
//! lives in [`TeamWorkloadConfig`], created lazily with defaults on first
//! touch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Role, TeamId, UserId};

use crate::assignment::AssignmentPolicy;
use crate::error::DispatchError;

/// Files one handler can hold before the router looks elsewhere
pub const DEFAULT_HANDLER_CAPACITY: i32 = 20;

/// Team ceiling applied when no config row exists yet
pub const DEFAULT_MAX_LOAD: i32 = 50;

/// Default load at which the team grade turns `WARNING`
pub const DEFAULT_ALERT_THRESHOLD: i32 = 40;

/// Fraction of `max_load` at which a team stops accepting rerouted work
pub const OVERLOAD_RATIO: f64 = 0.9;

/// One directory row, as the routing layer sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    /// Chef this user reports to; the chef's id doubles as the team id
    pub team_leader_id: Option<UserId>,
    /// Personal ceiling; `None` means the default capacity
    pub capacity: Option<i32>,
    pub active: bool,
    /// Drives deterministic tie-breaks in policy selection
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn capacity_or_default(&self) -> i32 {
        self.capacity.unwrap_or(DEFAULT_HANDLER_CAPACITY)
    }

    /// True for an active handler of either grade
    pub fn is_assignable_handler(&self) -> bool {
        self.active && self.role.is_gestionnaire()
    }

    /// True when this user works under the given team's chef
    pub fn belongs_to(&self, team_id: TeamId) -> bool {
        self.team_leader_id == Some(team_id.chef_id())
    }
}

/// A handler together with their current load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerLoad {
    pub user: User,
    /// Non-archived files in `ASSIGNE`, `EN_COURS` or `MIS_EN_INSTANCE`
    pub load: i64,
}

impl HandlerLoad {
    /// Remaining personal headroom; negative when over capacity
    pub fn headroom(&self) -> i64 {
        i64::from(self.user.capacity_or_default()) - self.load
    }
}

/// Per-team routing knobs, persisted once a chef tunes them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamWorkloadConfig {
    pub team_id: TeamId,
    /// Per-handler ceiling; at or over it the router reports overflow
    pub max_load: i32,
    /// Allow the overflow pass to reroute toward sibling teams
    pub auto_reassign_enabled: bool,
    /// Selection policy, for handlers and for overflow rerouting alike
    pub overflow_action: AssignmentPolicy,
    /// Load at which the team grade turns `WARNING`
    pub alert_threshold: i32,
    /// Last handler served by `ROUND_ROBIN`
    pub round_robin_cursor: Option<UserId>,
    pub updated_by: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

impl TeamWorkloadConfig {
    /// The config a team runs on before anyone tunes it
    pub fn defaults(team_id: TeamId, now: DateTime<Utc>) -> Self {
        Self {
            team_id,
            max_load: DEFAULT_MAX_LOAD,
            auto_reassign_enabled: true,
            overflow_action: AssignmentPolicy::LowestLoad,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            round_robin_cursor: None,
            updated_by: None,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if !(1..=200).contains(&self.max_load) {
            return Err(DispatchError::validation(
                "max_load must be between 1 and 200",
            ));
        }
        if self.alert_threshold < 0 || self.alert_threshold > self.max_load {
            return Err(DispatchError::validation(
                "alert_threshold must be between 0 and max_load",
            ));
        }
        Ok(())
    }
}

/// Team health, graded against the config thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamHealth {
    Healthy,
    Warning,
    Overloaded,
    Critical,
}

impl TeamHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamHealth::Healthy => "HEALTHY",
            TeamHealth::Warning => "WARNING",
            TeamHealth::Overloaded => "OVERLOADED",
            TeamHealth::Critical => "CRITICAL",
        }
    }
}

/// One member's line in the team analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberWorkload {
    pub user_id: UserId,
    pub display_name: String,
    pub load: i64,
    pub capacity: i32,
    /// Load over personal capacity, in percent
    pub utilization_pct: f64,
}

/// Workload analytics for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamWorkload {
    pub team_id: TeamId,
    pub members: Vec<MemberWorkload>,
    pub total_load: i64,
    pub max_load: i32,
    pub alert_threshold: i32,
    /// Mean load per member, the figure the grades compare against
    pub average_load: f64,
    pub health: TeamHealth,
}

impl TeamWorkload {
    /// Grades a team from its members' current loads
    ///
    /// The grade compares the mean member load against the config:
    /// `CRITICAL` at or over `max_load`, `OVERLOADED` at 90 % of it,
    /// `WARNING` at the alert threshold. An empty team is `HEALTHY`.
    pub fn analyze(config: &TeamWorkloadConfig, loads: &[HandlerLoad]) -> Self {
        let total_load: i64 = loads.iter().map(|h| h.load).sum();
        let average_load = if loads.is_empty() {
            0.0
        } else {
            total_load as f64 / loads.len() as f64
        };

        let health = if average_load >= f64::from(config.max_load) {
            TeamHealth::Critical
        } else if average_load >= f64::from(config.max_load) * OVERLOAD_RATIO {
            TeamHealth::Overloaded
        } else if average_load >= f64::from(config.alert_threshold) {
            TeamHealth::Warning
        } else {
            TeamHealth::Healthy
        };

        let members = loads
            .iter()
            .map(|h| {
                let capacity = h.user.capacity_or_default();
                MemberWorkload {
                    user_id: h.user.id,
                    display_name: h.user.display_name.clone(),
                    load: h.load,
                    capacity,
                    utilization_pct: if capacity > 0 {
                        h.load as f64 * 100.0 / f64::from(capacity)
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        Self {
            team_id: config.team_id,
            members,
            total_load,
            max_load: config.max_load,
            alert_threshold: config.alert_threshold,
            average_load,
            health,
        }
    }

    /// True when the team can still take rerouted work
    pub fn has_headroom(&self) -> bool {
        self.average_load < f64::from(self.max_load) * OVERLOAD_RATIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(load: i64, capacity: Option<i32>) -> HandlerLoad {
        HandlerLoad {
            user: User {
                id: UserId::new(),
                display_name: "Gest Test".to_string(),
                role: Role::Gestionnaire,
                team_leader_id: Some(UserId::new()),
                capacity,
                active: true,
                created_at: Utc::now(),
            },
            load,
        }
    }

    #[test]
    fn test_defaults_match_first_use() {
        let config = TeamWorkloadConfig::defaults(TeamId::new(), Utc::now());
        assert_eq!(config.max_load, 50);
        assert!(config.auto_reassign_enabled);
        assert_eq!(config.overflow_action, AssignmentPolicy::LowestLoad);
        assert_eq!(config.alert_threshold, 40);
        assert!(config.round_robin_cursor.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = TeamWorkloadConfig::defaults(TeamId::new(), Utc::now());
        config.max_load = 0;
        assert!(config.validate().is_err());

        config.max_load = 201;
        assert!(config.validate().is_err());

        config.max_load = 30;
        config.alert_threshold = 31;
        assert!(config.validate().is_err());

        config.alert_threshold = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_headroom_uses_personal_capacity() {
        assert_eq!(handler(18, Some(20)).headroom(), 2);
        assert_eq!(handler(2, Some(10)).headroom(), 8);
        assert_eq!(handler(5, None).headroom(), i64::from(DEFAULT_HANDLER_CAPACITY) - 5);
    }

    #[test]
    fn test_team_grades() {
        let mut config = TeamWorkloadConfig::defaults(TeamId::new(), Utc::now());
        config.max_load = 20;
        config.alert_threshold = 10;

        let healthy = TeamWorkload::analyze(&config, &[handler(4, None), handler(6, None)]);
        assert_eq!(healthy.health, TeamHealth::Healthy);
        assert!(healthy.has_headroom());

        let warning = TeamWorkload::analyze(&config, &[handler(12, None), handler(10, None)]);
        assert_eq!(warning.health, TeamHealth::Warning);
        assert!(warning.has_headroom());

        let overloaded = TeamWorkload::analyze(&config, &[handler(18, None), handler(18, None)]);
        assert_eq!(overloaded.health, TeamHealth::Overloaded);
        assert!(!overloaded.has_headroom());

        let critical = TeamWorkload::analyze(&config, &[handler(25, None), handler(20, None)]);
        assert_eq!(critical.health, TeamHealth::Critical);
    }

    #[test]
    fn test_empty_team_is_healthy() {
        let config = TeamWorkloadConfig::defaults(TeamId::new(), Utc::now());
        let report = TeamWorkload::analyze(&config, &[]);
        assert_eq!(report.health, TeamHealth::Healthy);
        assert_eq!(report.total_load, 0);
    }

    #[test]
    fn test_membership_follows_the_chef_link() {
        let chef = UserId::new();
        let team = TeamId::from_chef(chef);
        let mut user = handler(0, None).user;

        user.team_leader_id = Some(chef);
        assert!(user.belongs_to(team));

        user.team_leader_id = Some(UserId::new());
        assert!(!user.belongs_to(team));
    }
}
