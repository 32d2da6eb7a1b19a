//! Actors and roles
//!
//! Every mutating operation of the engine names the acting user explicitly.
//! There is no ambient "current user": handlers and services receive an
//! [`Actor`] built from verified credentials (or the reserved system actor
//! for scheduled jobs) and pass it down.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identifiers::{TeamId, UserId};

/// Back-office roles, from intake to payment
///
/// The set is closed: authorization rules match exhaustively on it and an
/// unknown role string is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Bureau d'ordre: registers incoming bordereaux
    Bo,
    /// Scan operators: digitize the paper batches
    ScanTeam,
    /// Claim handlers: process assigned bordereaux
    Gestionnaire,
    /// Senior handlers: same duties, trusted with escalated files
    GestionnaireSenior,
    /// Team leads: dispatch work to their gestionnaires
    ChefEquipe,
    /// Finance desk: drives the payment stages
    Finance,
    /// Unrestricted administrative role
    SuperAdmin,
}

impl Role {
    /// All roles, in pipeline order
    pub const ALL: [Role; 7] = [
        Role::Bo,
        Role::ScanTeam,
        Role::Gestionnaire,
        Role::GestionnaireSenior,
        Role::ChefEquipe,
        Role::Finance,
        Role::SuperAdmin,
    ];

    /// Wire name, matching the stored and transmitted form
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Bo => "BO",
            Role::ScanTeam => "SCAN_TEAM",
            Role::Gestionnaire => "GESTIONNAIRE",
            Role::GestionnaireSenior => "GESTIONNAIRE_SENIOR",
            Role::ChefEquipe => "CHEF_EQUIPE",
            Role::Finance => "FINANCE",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// True for both handler grades
    pub fn is_gestionnaire(&self) -> bool {
        matches!(self, Role::Gestionnaire | Role::GestionnaireSenior)
    }

    /// Roles that may lead a team of gestionnaires
    pub fn leads_team(&self) -> bool {
        matches!(self, Role::ChefEquipe | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BO" => Ok(Role::Bo),
            "SCAN_TEAM" => Ok(Role::ScanTeam),
            "GESTIONNAIRE" => Ok(Role::Gestionnaire),
            "GESTIONNAIRE_SENIOR" => Ok(Role::GestionnaireSenior),
            "CHEF_EQUIPE" => Ok(Role::ChefEquipe),
            "FINANCE" => Ok(Role::Finance),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            other => Err(CoreError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// The authenticated (or system) identity behind an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Team the actor belongs to or leads, when applicable
    pub team_id: Option<TeamId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            team_id: None,
        }
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// The reserved actor used by scheduled jobs (escalation sweep)
    ///
    /// A fixed nil-uuid identity so audit records from automated runs are
    /// recognizable and stable across restarts.
    pub fn system() -> Self {
        Self {
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            role: Role::SuperAdmin,
            team_id: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id.as_uuid().is_nil()
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Team this actor leads, if any
    ///
    /// For a chef the team id is their own user id; an explicit `team_id`
    /// claim takes precedence (e.g. a super-admin acting for a team).
    pub fn led_team(&self) -> Option<TeamId> {
        if self.role.leads_team() {
            Some(self.team_id.unwrap_or_else(|| TeamId::from_chef(self.user_id)))
        } else {
            None
        }
    }
}
