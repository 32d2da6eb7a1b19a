//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for common entities across the engine. All ids
//! and timestamps are deterministic so assertions can name exact values.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{Actor, BordereauId, ClientId, Role, TeamId, UserId};
use uuid::Uuid;

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard reception timestamp (Jan 15, 2025, 09:00 UTC)
    pub fn reception() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
    }

    /// `days` whole days after the reception anchor
    pub fn days_after(days: i64) -> DateTime<Utc> {
        Self::reception() + chrono::Duration::days(days)
    }

    /// Well inside the default thirty-day margin
    pub fn within_processing_sla() -> DateTime<Utc> {
        Self::days_after(2)
    }

    /// Inside the three-day warning band before the default deadline
    pub fn at_risk_processing_sla() -> DateTime<Utc> {
        Self::days_after(28)
    }

    /// Past the default thirty-day deadline
    pub fn past_processing_sla() -> DateTime<Utc> {
        Self::days_after(35)
    }
}

/// Fixture for deterministic identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn client_id() -> ClientId {
        ClientId::from_uuid(Uuid::from_u128(0x10))
    }

    pub fn bordereau_id() -> BordereauId {
        BordereauId::from_uuid(Uuid::from_u128(0x20))
    }

    /// A chef d'equipe; their id doubles as the team id
    pub fn chef_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x30))
    }

    pub fn team_id() -> TeamId {
        TeamId::from_chef(Self::chef_id())
    }

    pub fn gestionnaire_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x31))
    }

    pub fn senior_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x32))
    }

    /// A second chef, anchoring a sibling team
    pub fn other_chef_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x40))
    }

    pub fn other_team_id() -> TeamId {
        TeamId::from_chef(Self::other_chef_id())
    }

    pub fn bo_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x50))
    }

    pub fn scan_operator_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x51))
    }

    pub fn finance_agent_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x52))
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// A well-formed bordereau reference
    pub fn reference() -> &'static str {
        "BRD-2025-0042"
    }

    /// A second reference for duplicate-check tests
    pub fn other_reference() -> &'static str {
        "BRD-2025-0043"
    }

    pub fn document_name() -> &'static str {
        "bs_0001.pdf"
    }

    pub fn reason() -> &'static str {
        "piece justificative manquante"
    }
}

/// Fixture for pre-built actors, ids shared with [`IdFixtures`]
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn bo() -> Actor {
        Actor::new(IdFixtures::bo_id(), Role::Bo)
    }

    pub fn chef() -> Actor {
        Actor::new(IdFixtures::chef_id(), Role::ChefEquipe)
    }

    pub fn other_chef() -> Actor {
        Actor::new(IdFixtures::other_chef_id(), Role::ChefEquipe)
    }

    pub fn gestionnaire() -> Actor {
        Actor::new(IdFixtures::gestionnaire_id(), Role::Gestionnaire)
    }

    pub fn senior() -> Actor {
        Actor::new(IdFixtures::senior_id(), Role::GestionnaireSenior)
    }

    pub fn scan_team() -> Actor {
        Actor::new(IdFixtures::scan_operator_id(), Role::ScanTeam)
    }

    pub fn finance() -> Actor {
        Actor::new(IdFixtures::finance_agent_id(), Role::Finance)
    }

    pub fn admin() -> Actor {
        Actor::new(UserId::from_uuid(Uuid::from_u128(0x60)), Role::SuperAdmin)
    }
}
