//! In-Memory Port Adapters
//!
//! Lock-backed implementations of every port, mirroring the PostgreSQL
//! adapters' semantics: the guarded write bumps the version and appends
//! history atomically, listings skip archived rows, counts cover the
//! active-handling statuts only. Service and API tests run the real
//! orchestration against these.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use core_kernel::{
    AdapterHealth, BordereauId, ClientId, Clock, DocumentId, DomainPort, HealthCheckResult,
    HealthCheckable, PortError, TeamId, UserId,
};
use domain_bordereau::bordereau::Bordereau;
use domain_bordereau::document::Document;
use domain_bordereau::events::{Notification, NotificationKind};
use domain_bordereau::history::TraitementHistory;
use domain_bordereau::ports::{BordereauStore, DocumentStore, NotificationPort};
use domain_bordereau::statut::Statut;
use domain_dispatch::{DirectoryPort, TeamConfigStore, TeamWorkloadConfig, User};

/// In-memory [`BordereauStore`]
#[derive(Default)]
pub struct InMemoryBordereauStore {
    rows: RwLock<HashMap<BordereauId, Bordereau>>,
    history: RwLock<Vec<TraitementHistory>>,
    conflict_next_update: AtomicBool,
}

impl InMemoryBordereauStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a row directly, without a creation record
    pub fn seed(&self, bordereau: Bordereau) {
        self.rows.write().unwrap().insert(bordereau.id, bordereau);
    }

    /// Forces the next guarded write to lose its race
    pub fn conflict_next_update(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }

    /// Every history record appended so far, in append order
    pub fn all_history(&self) -> Vec<TraitementHistory> {
        self.history.read().unwrap().clone()
    }
}

impl DomainPort for InMemoryBordereauStore {}

#[async_trait]
impl BordereauStore for InMemoryBordereauStore {
    async fn get(&self, id: BordereauId) -> Result<Bordereau, PortError> {
        self.rows
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("bordereau", id))
    }

    async fn reference_exists(
        &self,
        client_id: ClientId,
        reference: &str,
    ) -> Result<bool, PortError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .any(|b| b.client_id == client_id && b.reference == reference))
    }

    async fn insert(
        &self,
        bordereau: &Bordereau,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError> {
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(&bordereau.id) {
            return Err(PortError::conflict("duplicate bordereau id"));
        }
        rows.insert(bordereau.id, bordereau.clone());
        self.history.write().unwrap().push(history.clone());
        Ok(bordereau.clone())
    }

    async fn update_guarded(
        &self,
        bordereau: &Bordereau,
        expected_version: i64,
        history: &TraitementHistory,
    ) -> Result<Bordereau, PortError> {
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Err(PortError::conflict("staged conflict"));
        }
        let mut rows = self.rows.write().unwrap();
        let stored = rows
            .get_mut(&bordereau.id)
            .ok_or_else(|| PortError::not_found("bordereau", bordereau.id))?;
        if stored.version != expected_version {
            return Err(PortError::conflict(format!(
                "expected version {expected_version}, found {}",
                stored.version
            )));
        }
        let mut updated = bordereau.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        self.history.write().unwrap().push(history.clone());
        Ok(updated)
    }

    async fn list_by_statuts(&self, statuts: &[Statut]) -> Result<Vec<Bordereau>, PortError> {
        let mut matched: Vec<Bordereau> = self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|b| !b.archived && statuts.contains(&b.statut))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn list_recently_updated(
        &self,
        statuts: &[Statut],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError> {
        let mut matched: Vec<Bordereau> = self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|b| !b.archived && statuts.contains(&b.statut) && b.updated_at >= since)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn page_open(
        &self,
        after: Option<BordereauId>,
        limit: i64,
    ) -> Result<Vec<Bordereau>, PortError> {
        let mut matched: Vec<Bordereau> = self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|b| {
                !b.archived
                    && !b.statut.is_terminal()
                    && after.map_or(true, |cursor| b.id > cursor)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|b| b.id);
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn count_active_for(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, i64>, PortError> {
        let rows = self.rows.read().unwrap();
        let mut counts = HashMap::new();
        for bordereau in rows.values() {
            if bordereau.archived || !bordereau.statut.is_active_handling() {
                continue;
            }
            if let Some(user) = bordereau.ownership.assigned_to() {
                if users.contains(&user) {
                    *counts.entry(user).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn history_for(&self, id: BordereauId) -> Result<Vec<TraitementHistory>, PortError> {
        let mut matched: Vec<TraitementHistory> = self
            .history
            .read()
            .unwrap()
            .iter()
            .filter(|h| h.bordereau_id == id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matched)
    }
}

/// In-memory [`DocumentStore`]
#[derive(Default)]
pub struct InMemoryDocumentStore {
    rows: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, document: Document) {
        self.rows.write().unwrap().insert(document.id, document);
    }
}

impl DomainPort for InMemoryDocumentStore {}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, document: &Document) -> Result<Document, PortError> {
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(&document.id) {
            return Err(PortError::conflict("duplicate document id"));
        }
        rows.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn get(&self, id: DocumentId) -> Result<Document, PortError> {
        self.rows
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("document", id))
    }

    async fn update(&self, document: &Document) -> Result<Document, PortError> {
        let mut rows = self.rows.write().unwrap();
        let stored = rows
            .get_mut(&document.id)
            .ok_or_else(|| PortError::not_found("document", document.id))?;
        *stored = document.clone();
        Ok(document.clone())
    }

    async fn list_for(&self, bordereau_id: BordereauId) -> Result<Vec<Document>, PortError> {
        let mut matched: Vec<Document> = self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|d| d.bordereau_id == bordereau_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn count_for(&self, bordereau_id: BordereauId) -> Result<i64, PortError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|d| d.bordereau_id == bordereau_id)
            .count() as i64)
    }

    async fn count_for_many(
        &self,
        bordereau_ids: &[BordereauId],
    ) -> Result<HashMap<BordereauId, i64>, PortError> {
        let rows = self.rows.read().unwrap();
        let mut counts = HashMap::new();
        for document in rows.values() {
            if bordereau_ids.contains(&document.bordereau_id) {
                *counts.entry(document.bordereau_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

/// Recording [`NotificationPort`]
///
/// Publishes into a vector tests inspect; can be switched to fail so the
/// best-effort contract of callers is observable.
#[derive(Default)]
pub struct RecordingNotifier {
    published: RwLock<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.read().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.published.read().unwrap().iter().map(|n| n.kind).collect()
    }

    /// Notifications emitted for one bordereau, in publish order
    pub fn for_bordereau(&self, id: BordereauId) -> Vec<Notification> {
        self.published
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.bordereau_id == id)
            .cloned()
            .collect()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn publish(&self, notification: Notification) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::connection("notification carrier down"));
        }
        self.published.write().unwrap().push(notification);
        Ok(())
    }
}

/// In-memory [`DirectoryPort`]
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::default();
        for user in users {
            directory.add(user);
        }
        directory
    }

    pub fn add(&self, user: User) {
        self.users.write().unwrap().insert(user.id, user);
    }
}

impl DomainPort for InMemoryDirectory {}

#[async_trait]
impl DirectoryPort for InMemoryDirectory {
    async fn get_user(&self, id: UserId) -> Result<User, PortError> {
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("user", id))
    }

    async fn team_members(&self, team_id: TeamId) -> Result<Vec<User>, PortError> {
        let mut members: Vec<User> = self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.team_leader_id == Some(team_id.chef_id()))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn active_chefs(&self) -> Result<Vec<User>, PortError> {
        let mut chefs: Vec<User> = self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.active && u.role == core_kernel::Role::ChefEquipe)
            .cloned()
            .collect();
        chefs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(chefs)
    }
}

/// In-memory [`TeamConfigStore`]
#[derive(Default)]
pub struct InMemoryTeamConfigStore {
    configs: RwLock<HashMap<TeamId, TeamWorkloadConfig>>,
}

impl InMemoryTeamConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, config: TeamWorkloadConfig) {
        self.configs.write().unwrap().insert(config.team_id, config);
    }
}

impl DomainPort for InMemoryTeamConfigStore {}

#[async_trait]
impl TeamConfigStore for InMemoryTeamConfigStore {
    async fn get(&self, team_id: TeamId) -> Result<Option<TeamWorkloadConfig>, PortError> {
        Ok(self.configs.read().unwrap().get(&team_id).cloned())
    }

    async fn upsert(&self, config: &TeamWorkloadConfig) -> Result<TeamWorkloadConfig, PortError> {
        self.configs
            .write()
            .unwrap()
            .insert(config.team_id, config.clone());
        Ok(config.clone())
    }
}

/// Steerable [`Clock`] for deterministic duration and sweep tests
pub struct TestClock {
    now: RwLock<DateTime<Utc>>,
}

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap();
        *now += duration;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

/// Always-healthy probe for readiness endpoints under test
pub struct StaticHealth;

#[async_trait]
impl HealthCheckable for StaticHealth {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: "static".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: None,
            checked_at: Utc::now(),
        }
    }
}
