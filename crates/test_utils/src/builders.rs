//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about and rely on defaults for
//! everything else.

use chrono::{DateTime, Utc};
use core_kernel::{BordereauId, ClientId, TeamId, UserId};
use domain_bordereau::bordereau::{Bordereau, Priorite};
use domain_bordereau::document::{Document, DocumentStatut};
use domain_bordereau::ownership::Ownership;
use domain_bordereau::statut::Statut;
use domain_dispatch::{AssignmentPolicy, TeamWorkloadConfig, User};
use fake::faker::name::fr_fr::Name;
use fake::Fake;

use crate::fixtures::{IdFixtures, StringFixtures, TemporalFixtures};

/// Builder for constructing test bordereaux
pub struct BordereauBuilder {
    bordereau: Bordereau,
}

impl Default for BordereauBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BordereauBuilder {
    /// Creates a new builder: a fresh `EN_ATTENTE` file under the fixture
    /// client, received at the fixture anchor
    pub fn new() -> Self {
        let now = TemporalFixtures::reception();
        Self {
            bordereau: Bordereau {
                id: BordereauId::new_v7(),
                reference: StringFixtures::reference().to_string(),
                client_id: IdFixtures::client_id(),
                statut: Statut::EnAttente,
                priorite: Priorite::Normale,
                nombre_bs: 10,
                delai_reglement: 30,
                date_reception: now,
                date_debut_scan: None,
                date_fin_scan: None,
                date_reception_sante: None,
                date_depot_virement: None,
                date_execution_virement: None,
                date_cloture: None,
                ownership: Ownership::unassigned(),
                team_id: None,
                archived: false,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: BordereauId) -> Self {
        self.bordereau.id = id;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.bordereau.reference = reference.into();
        self
    }

    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.bordereau.client_id = client_id;
        self
    }

    pub fn with_statut(mut self, statut: Statut) -> Self {
        self.bordereau.statut = statut;
        self
    }

    pub fn with_priorite(mut self, priorite: Priorite) -> Self {
        self.bordereau.priorite = priorite;
        self
    }

    pub fn with_nombre_bs(mut self, nombre_bs: i32) -> Self {
        self.bordereau.nombre_bs = nombre_bs;
        self
    }

    pub fn with_delai(mut self, days: i64) -> Self {
        self.bordereau.delai_reglement = days;
        self
    }

    /// Moves the whole intake anchor (reception, created, updated)
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.bordereau.date_reception = at;
        self.bordereau.created_at = at;
        self.bordereau.updated_at = at;
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.bordereau.updated_at = at;
        self
    }

    /// `ASSIGNE` to the given handler
    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.bordereau.statut = Statut::Assigne;
        self.bordereau.ownership = Ownership::assigned(user);
        self
    }

    /// `EN_COURS` under the given handler
    pub fn in_progress_by(mut self, user: UserId) -> Self {
        self.bordereau.statut = Statut::EnCours;
        self.bordereau.ownership = Ownership::working(user);
        self
    }

    /// Overrides the ownership pair without touching the statut; lets
    /// tests stage drifted rows on purpose
    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.bordereau.ownership = ownership;
        self
    }

    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.bordereau.team_id = Some(team_id);
        self
    }

    /// `CLOTURE` with the closing stamp set
    pub fn closed_at(mut self, at: DateTime<Utc>) -> Self {
        self.bordereau.statut = Statut::Cloture;
        self.bordereau.date_cloture = Some(at);
        self.bordereau.ownership = Ownership::unassigned();
        self.bordereau.updated_at = at;
        self
    }

    pub fn archived(mut self) -> Self {
        self.bordereau.archived = true;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.bordereau.version = version;
        self
    }

    pub fn build(self) -> Bordereau {
        self.bordereau
    }
}

/// Builder for constructing directory users
pub struct UserBuilder {
    user: User,
}

impl Default for UserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UserBuilder {
    /// Creates a new builder: an active gestionnaire with a generated name
    /// and no team attachment
    pub fn new() -> Self {
        Self {
            user: User {
                id: UserId::new(),
                display_name: Name().fake(),
                role: core_kernel::Role::Gestionnaire,
                team_leader_id: None,
                capacity: None,
                active: true,
                created_at: TemporalFixtures::reception(),
            },
        }
    }

    pub fn with_id(mut self, id: UserId) -> Self {
        self.user.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user.display_name = name.into();
        self
    }

    pub fn with_role(mut self, role: core_kernel::Role) -> Self {
        self.user.role = role;
        self
    }

    /// Chef d'equipe; chefs report to no one
    pub fn chef(mut self) -> Self {
        self.user.role = core_kernel::Role::ChefEquipe;
        self.user.team_leader_id = None;
        self
    }

    pub fn senior(mut self) -> Self {
        self.user.role = core_kernel::Role::GestionnaireSenior;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.user.active = false;
        self
    }

    /// Attaches the user to the team anchored by the given chef
    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.user.team_leader_id = Some(team_id.chef_id());
        self
    }

    pub fn with_capacity(mut self, capacity: i32) -> Self {
        self.user.capacity = Some(capacity);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.user.created_at = at;
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}

/// Builder for constructing team workload configs
pub struct TeamConfigBuilder {
    config: TeamWorkloadConfig,
}

impl Default for TeamConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamConfigBuilder {
    /// Creates a new builder with the domain defaults for the fixture team
    pub fn new() -> Self {
        Self {
            config: TeamWorkloadConfig::defaults(
                IdFixtures::team_id(),
                TemporalFixtures::reception(),
            ),
        }
    }

    pub fn for_team(mut self, team_id: TeamId) -> Self {
        self.config.team_id = team_id;
        self
    }

    pub fn with_max_load(mut self, max_load: i32) -> Self {
        self.config.max_load = max_load;
        self
    }

    pub fn with_alert_threshold(mut self, threshold: i32) -> Self {
        self.config.alert_threshold = threshold;
        self
    }

    pub fn with_overflow_action(mut self, policy: AssignmentPolicy) -> Self {
        self.config.overflow_action = policy;
        self
    }

    pub fn auto_reassign(mut self, enabled: bool) -> Self {
        self.config.auto_reassign_enabled = enabled;
        self
    }

    pub fn with_cursor(mut self, user: UserId) -> Self {
        self.config.round_robin_cursor = Some(user);
        self
    }

    pub fn build(self) -> TeamWorkloadConfig {
        self.config
    }
}

/// Builder for constructing scanned slips
pub struct DocumentBuilder {
    document: Document,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let now = TemporalFixtures::reception();
        Self {
            document: Document {
                id: core_kernel::DocumentId::new_v7(),
                bordereau_id: IdFixtures::bordereau_id(),
                name: StringFixtures::document_name().to_string(),
                statut: DocumentStatut::Uploaded,
                assigned_to: None,
                uploaded_at: now,
                updated_at: now,
            },
        }
    }

    pub fn for_bordereau(mut self, bordereau_id: BordereauId) -> Self {
        self.document.bordereau_id = bordereau_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.document.name = name.into();
        self
    }

    pub fn with_statut(mut self, statut: DocumentStatut) -> Self {
        self.document.statut = statut;
        self
    }

    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.document.assigned_to = Some(user);
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}
