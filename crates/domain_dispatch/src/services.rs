//! Dispatch services
//!
//! The assignment router and the corbeille resolver. Mutations follow the
//! workflow crate's shape: read, reconcile, apply, guarded write, notify
//! best-effort. Selection stays pure ([`crate::assignment`]); everything
//! async in here is port traffic.

use chrono::Duration;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use core_kernel::{Actor, BordereauId, Clock, Role, TeamId, UserId};
use domain_bordereau::bordereau::{Bordereau, TransitionCommand};
use domain_bordereau::error::WorkflowError;
use domain_bordereau::events::{Audience, Notification, NotificationKind};
use domain_bordereau::history::{HistoryAction, TraitementHistory};
use domain_bordereau::ownership::Ownership;
use domain_bordereau::ports::{BordereauStore, DocumentStore, NotificationPort};
use domain_bordereau::statut::Statut;

use crate::assignment::{select_handler, AssignmentPolicy};
use crate::corbeille::{self, Corbeille, COMPLETED_CAP, COMPLETED_WINDOW_DAYS};
use crate::error::DispatchError;
use crate::ports::{DirectoryPort, TeamConfigStore};
use crate::workload::{HandlerLoad, TeamWorkload, TeamWorkloadConfig, User};

/// One routed assignment request
#[derive(Debug, Clone)]
pub struct AssignRequest {
    pub bordereau_id: BordereauId,
    /// Target team; falls back to the file's custody team, then the
    /// acting chef's own
    pub team_id: Option<TeamId>,
    /// Policy override; the team config decides when absent
    pub policy: Option<AssignmentPolicy>,
    /// Direct pick; skips policy selection and the ceiling
    pub assigned_to: Option<UserId>,
}

/// A reassignment away from the current handler
#[derive(Debug, Clone)]
pub struct ReassignRequest {
    pub bordereau_id: BordereauId,
    pub team_id: Option<TeamId>,
    pub policy: Option<AssignmentPolicy>,
    pub assigned_to: Option<UserId>,
    /// Mandatory; reassignments are always explained
    pub reason: String,
}

/// The entity after routing, plus who got it
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub bordereau: Bordereau,
    pub handler: User,
}

/// Per-entity result of a bulk dispatch; the batch never aborts early
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkAssignmentReport {
    pub assigned: Vec<BordereauId>,
    pub failures: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub bordereau_id: BordereauId,
    pub error: String,
}

/// Fields a chef may tune on their team config
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    pub max_load: i32,
    pub auto_reassign_enabled: bool,
    pub overflow_action: AssignmentPolicy,
    pub alert_threshold: i32,
}

/// Routes bordereaux to handlers under the team ceilings
pub struct AssignmentService {
    store: Arc<dyn BordereauStore>,
    directory: Arc<dyn DirectoryPort>,
    team_configs: Arc<dyn TeamConfigStore>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn BordereauStore>,
        directory: Arc<dyn DirectoryPort>,
        team_configs: Arc<dyn TeamConfigStore>,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            team_configs,
            notifier,
            clock,
        }
    }

    /// Assigns one file, by policy or by explicit pick
    ///
    /// Saturation is not fatal: with auto-reassign enabled the router
    /// tries sibling teams first, and only then reports
    /// [`DispatchError::Overflow`].
    pub async fn assign(
        &self,
        req: AssignRequest,
        actor: &Actor,
    ) -> Result<AssignmentOutcome, DispatchError> {
        if !actor.role.leads_team() {
            return Err(DispatchError::validation(format!(
                "role {} may not dispatch files",
                actor.role
            )));
        }
        let stored = self.fetch(req.bordereau_id).await?;
        let team = req
            .team_id
            .or(stored.team_id)
            .or_else(|| actor.led_team())
            .ok_or_else(|| DispatchError::validation("no target team for this assignment"))?;

        if let Some(user_id) = req.assigned_to {
            let handler = self.eligible_member(team, user_id).await?;
            return self
                .commit(stored, handler, team, actor, HistoryAction::Assignment, None)
                .await;
        }

        let pool = self.handler_pool(team).await?;
        if pool.is_empty() {
            return Err(DispatchError::EmptyPool { team_id: team });
        }
        let loads = self.pool_loads(&pool).await?;
        let config = self.team_configs.get_or_default(team, self.clock.now()).await?;
        let policy = req.policy.unwrap_or(config.overflow_action);

        match select_handler(policy, &loads, config.max_load, config.round_robin_cursor) {
            Some(pick) => {
                let handler = pick.user.clone();
                let outcome = self
                    .commit(stored, handler, team, actor, HistoryAction::Assignment, None)
                    .await?;
                self.advance_cursor(policy, config, outcome.handler.id).await;
                Ok(outcome)
            }
            None => self.overflow(stored, team, config, actor).await,
        }
    }

    /// Moves an actively held file to another handler
    ///
    /// Statut is preserved; only the ownership pair changes, in one
    /// guarded write, so the file never names two handlers at once.
    pub async fn reassign(
        &self,
        req: ReassignRequest,
        actor: &Actor,
    ) -> Result<AssignmentOutcome, DispatchError> {
        if !actor.role.leads_team() {
            return Err(DispatchError::validation(format!(
                "role {} may not reassign files",
                actor.role
            )));
        }
        let reason = req.reason.trim().to_string();
        if reason.is_empty() {
            return Err(DispatchError::validation("a reassignment needs a reason"));
        }
        let stored = self.fetch(req.bordereau_id).await?;
        if !stored.statut.is_active_handling() {
            return Err(DispatchError::validation(format!(
                "a file in {} has no handler to reassign",
                stored.statut
            )));
        }
        let from_user = stored
            .ownership
            .assigned_to()
            .ok_or_else(|| DispatchError::validation("the file is not currently assigned"))?;
        let team = req
            .team_id
            .or(stored.team_id)
            .or_else(|| actor.led_team())
            .ok_or_else(|| DispatchError::validation("no target team for this reassignment"))?;

        let mut cursor_update = None;
        let handler = match req.assigned_to {
            Some(user_id) => {
                if user_id == from_user {
                    return Err(DispatchError::validation(
                        "the file is already held by this handler",
                    ));
                }
                self.eligible_member(team, user_id).await?
            }
            None => {
                let pool: Vec<User> = self
                    .handler_pool(team)
                    .await?
                    .into_iter()
                    .filter(|u| u.id != from_user)
                    .collect();
                if pool.is_empty() {
                    return Err(DispatchError::EmptyPool { team_id: team });
                }
                let loads = self.pool_loads(&pool).await?;
                let config = self.team_configs.get_or_default(team, self.clock.now()).await?;
                let policy = req.policy.unwrap_or(config.overflow_action);
                let pick = select_handler(policy, &loads, config.max_load, config.round_robin_cursor)
                    .ok_or(DispatchError::Overflow {
                        team_id: team,
                        max_load: config.max_load,
                    })?;
                let handler = pick.user.clone();
                cursor_update = Some((policy, config));
                handler
            }
        };

        let now = self.clock.now();
        let mut updated = stored.clone();
        updated.ownership = match stored.statut {
            Statut::Assigne => Ownership::assigned(handler.id),
            _ => Ownership::working(handler.id),
        };
        updated.team_id = Some(team);
        updated.updated_at = now;
        let history = TraitementHistory::record(
            stored.id,
            actor.user_id,
            HistoryAction::Reassignment,
            now,
        )
        .with_statuts(Some(stored.statut), stored.statut)
        .with_assigned_to(handler.id)
        .with_reason(reason);

        let written = self
            .store
            .update_guarded(&updated, stored.version, &history)
            .await
            .map_err(|e| WorkflowError::from_port(e, stored.id))?;
        if let Some((policy, config)) = cursor_update {
            self.advance_cursor(policy, config, handler.id).await;
        }
        self.notify(
            Notification::new(
                NotificationKind::Assigned,
                written.id,
                Audience::User { user_id: handler.id },
                format!("Bordereau {} vous est re-affecte", written.reference),
                now,
            )
            .with_actor(actor.user_id),
        )
        .await;
        Ok(AssignmentOutcome {
            bordereau: written,
            handler,
        })
    }

    /// Hands a list of files to one handler; failures are reported per
    /// entity, never aborting the rest of the batch
    pub async fn bulk_assign(
        &self,
        bordereau_ids: Vec<BordereauId>,
        assigned_to: UserId,
        actor: &Actor,
    ) -> Result<BulkAssignmentReport, DispatchError> {
        if !actor.role.leads_team() {
            return Err(DispatchError::validation(format!(
                "role {} may not dispatch files",
                actor.role
            )));
        }
        if bordereau_ids.is_empty() {
            return Err(DispatchError::validation("no bordereaux to assign"));
        }
        let handler = self.directory.get_user(assigned_to).await?;
        if !handler.is_assignable_handler() {
            return Err(DispatchError::ineligible(
                assigned_to,
                "inactive or not a gestionnaire",
            ));
        }
        let team = handler
            .team_leader_id
            .map(TeamId::from_chef)
            .ok_or_else(|| DispatchError::ineligible(assigned_to, "not attached to any team"))?;
        let config = self.team_configs.get_or_default(team, self.clock.now()).await?;
        let base_load = self
            .store
            .count_active_for(&[assigned_to])
            .await?
            .get(&assigned_to)
            .copied()
            .unwrap_or(0);

        let mut report = BulkAssignmentReport::default();
        for bordereau_id in bordereau_ids {
            let projected = base_load + report.assigned.len() as i64;
            if projected >= i64::from(config.max_load) {
                report.failures.push(BulkFailure {
                    bordereau_id,
                    error: format!("handler at ceiling ({} files)", projected),
                });
                continue;
            }
            let result = async {
                let stored = self.fetch(bordereau_id).await?;
                self.commit(
                    stored,
                    handler.clone(),
                    team,
                    actor,
                    HistoryAction::BulkAssignment,
                    None,
                )
                .await
            }
            .await;
            match result {
                Ok(_) => report.assigned.push(bordereau_id),
                Err(err) => report.failures.push(BulkFailure {
                    bordereau_id,
                    error: err.to_string(),
                }),
            }
        }
        info!(
            handler = %assigned_to,
            assigned = report.assigned.len(),
            failed = report.failures.len(),
            "bulk assignment finished"
        );
        Ok(report)
    }

    /// Current load picture of one team
    pub async fn team_workload(&self, team_id: TeamId) -> Result<TeamWorkload, DispatchError> {
        let pool = self.handler_pool(team_id).await?;
        let loads = self.pool_loads(&pool).await?;
        let config = self
            .team_configs
            .get_or_default(team_id, self.clock.now())
            .await?;
        Ok(TeamWorkload::analyze(&config, &loads))
    }

    /// Stored or default config of one team
    pub async fn team_config(&self, team_id: TeamId) -> Result<TeamWorkloadConfig, DispatchError> {
        Ok(self
            .team_configs
            .get_or_default(team_id, self.clock.now())
            .await?)
    }

    /// Replaces the tunable fields of a team config
    pub async fn put_team_config(
        &self,
        team_id: TeamId,
        update: ConfigUpdate,
        actor: &Actor,
    ) -> Result<TeamWorkloadConfig, DispatchError> {
        if !(actor.is_super_admin() || actor.led_team() == Some(team_id)) {
            return Err(DispatchError::validation(
                "only the team's chef or an administrator may tune it",
            ));
        }
        let chef = match self.directory.get_user(team_id.chef_id()).await {
            Ok(chef) => chef,
            Err(err) if err.is_not_found() => {
                return Err(DispatchError::validation(
                    "the team id does not name a known chef",
                ))
            }
            Err(err) => return Err(err.into()),
        };
        if !chef.active || chef.role != Role::ChefEquipe {
            return Err(DispatchError::validation(
                "the team must belong to an active chef d'equipe",
            ));
        }
        let now = self.clock.now();
        let mut config = self.team_configs.get_or_default(team_id, now).await?;
        config.max_load = update.max_load;
        config.auto_reassign_enabled = update.auto_reassign_enabled;
        config.overflow_action = update.overflow_action;
        config.alert_threshold = update.alert_threshold;
        config.updated_by = Some(actor.user_id);
        config.updated_at = now;
        config.validate()?;
        Ok(self.team_configs.upsert(&config).await?)
    }

    async fn fetch(&self, id: BordereauId) -> Result<Bordereau, DispatchError> {
        Ok(self
            .store
            .get(id)
            .await
            .map_err(|e| WorkflowError::from_port(e, id))?)
    }

    /// Active gestionnaires of one team, one directory round trip
    async fn handler_pool(&self, team_id: TeamId) -> Result<Vec<User>, DispatchError> {
        Ok(self
            .directory
            .team_members(team_id)
            .await?
            .into_iter()
            .filter(User::is_assignable_handler)
            .collect())
    }

    async fn pool_loads(&self, pool: &[User]) -> Result<Vec<HandlerLoad>, DispatchError> {
        let ids: Vec<UserId> = pool.iter().map(|u| u.id).collect();
        let counts: HashMap<UserId, i64> = self.store.count_active_for(&ids).await?;
        Ok(pool
            .iter()
            .map(|user| HandlerLoad {
                load: counts.get(&user.id).copied().unwrap_or(0),
                user: user.clone(),
            })
            .collect())
    }

    /// Validates a directly named assignee against the target team
    async fn eligible_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<User, DispatchError> {
        let user = match self.directory.get_user(user_id).await {
            Ok(user) => user,
            Err(err) if err.is_not_found() => {
                return Err(DispatchError::ineligible(user_id, "unknown user"))
            }
            Err(err) => return Err(err.into()),
        };
        if !user.active {
            return Err(DispatchError::ineligible(user_id, "inactive account"));
        }
        if !user.role.is_gestionnaire() {
            return Err(DispatchError::ineligible(
                user_id,
                format!("role {} does not take assignments", user.role),
            ));
        }
        if !user.belongs_to(team_id) {
            return Err(DispatchError::ineligible(user_id, "not in the target team"));
        }
        Ok(user)
    }

    /// The shared guarded mutation: ready state into `ASSIGNE`, team
    /// custody recorded, one history record, events published best-effort
    async fn commit(
        &self,
        stored: Bordereau,
        handler: User,
        team: TeamId,
        actor: &Actor,
        action: HistoryAction,
        reason: Option<String>,
    ) -> Result<AssignmentOutcome, DispatchError> {
        let mut cmd = TransitionCommand::new(Statut::Assigne, *actor, self.clock.now())
            .with_assignee(handler.id)
            .with_action(action);
        if let Some(reason) = reason {
            cmd = cmd.with_reason(reason);
        }

        let mut current = stored.clone();
        let (healed, drift) = current.ownership.reconciled_with(current.statut, current.id);
        if drift.is_some() {
            warn!(bordereau_id = %current.id, "normalizing drifted ownership in this assignment");
            current.ownership = healed;
        }

        let mut outcome = current.transition(cmd)?;
        outcome.bordereau.team_id = Some(team);
        let written = self
            .store
            .update_guarded(&outcome.bordereau, stored.version, &outcome.history)
            .await
            .map_err(|e| WorkflowError::from_port(e, stored.id))?;
        for notification in outcome.notifications {
            self.notify(notification).await;
        }
        Ok(AssignmentOutcome {
            bordereau: written,
            handler,
        })
    }

    /// Persists the round-robin cursor; a lost cursor only skews the next
    /// pick, so failures are logged and swallowed
    async fn advance_cursor(
        &self,
        policy: AssignmentPolicy,
        mut config: TeamWorkloadConfig,
        handler: UserId,
    ) {
        if policy != AssignmentPolicy::RoundRobin {
            return;
        }
        config.round_robin_cursor = Some(handler);
        config.updated_at = self.clock.now();
        if let Err(err) = self.team_configs.upsert(&config).await {
            warn!(error = %err, team_id = %config.team_id, "round-robin cursor not persisted");
        }
    }

    /// Saturation path: reroute toward a sibling team, or alert and report
    async fn overflow(
        &self,
        stored: Bordereau,
        team: TeamId,
        config: TeamWorkloadConfig,
        actor: &Actor,
    ) -> Result<AssignmentOutcome, DispatchError> {
        warn!(team_id = %team, max_load = config.max_load, "team saturated");
        self.notify(
            Notification::new(
                NotificationKind::TeamOverload,
                stored.id,
                Audience::Team { team_id: team },
                format!("Equipe saturee, bordereau {} en attente", stored.reference),
                self.clock.now(),
            )
            .with_actor(actor.user_id),
        )
        .await;

        if config.auto_reassign_enabled {
            if let Some((sibling, sibling_config, pick)) =
                self.sibling_with_headroom(team, config.overflow_action).await?
            {
                info!(from = %team, to = %sibling, handler = %pick.id, "rerouting overflow");
                let outcome = self
                    .commit(stored, pick, sibling, actor, HistoryAction::Assignment, None)
                    .await?;
                self.advance_cursor(
                    sibling_config.overflow_action,
                    sibling_config,
                    outcome.handler.id,
                )
                .await;
                return Ok(outcome);
            }
            self.notify(
                Notification::new(
                    NotificationKind::EscalationRequired,
                    stored.id,
                    Audience::Role {
                        role: Role::SuperAdmin,
                    },
                    format!(
                        "Aucune equipe disponible pour le bordereau {}",
                        stored.reference
                    ),
                    self.clock.now(),
                )
                .with_actor(actor.user_id),
            )
            .await;
        }
        Err(DispatchError::Overflow {
            team_id: team,
            max_load: config.max_load,
        })
    }

    /// Ranks sibling teams under 90 % of their own ceiling and picks a
    /// handler inside the best one
    async fn sibling_with_headroom(
        &self,
        exclude: TeamId,
        policy: AssignmentPolicy,
    ) -> Result<Option<(TeamId, TeamWorkloadConfig, User)>, DispatchError> {
        let now = self.clock.now();
        let mut candidates = Vec::new();
        for chef in self.directory.active_chefs().await? {
            let team = TeamId::from_chef(chef.id);
            if team == exclude {
                continue;
            }
            let pool = self.handler_pool(team).await?;
            if pool.is_empty() {
                continue;
            }
            let loads = self.pool_loads(&pool).await?;
            let team_config = self.team_configs.get_or_default(team, now).await?;
            let workload = TeamWorkload::analyze(&team_config, &loads);
            if workload.has_headroom() {
                candidates.push(TeamCandidate {
                    team,
                    chef_created: chef.created_at,
                    average_load: workload.average_load,
                    total_headroom: loads.iter().map(HandlerLoad::headroom).sum(),
                    config: team_config,
                    loads,
                });
            }
        }

        // Stable order mirrors handler selection: oldest chef first.
        candidates.sort_by(|a, b| {
            a.chef_created
                .cmp(&b.chef_created)
                .then(a.team.cmp(&b.team))
        });
        match policy {
            AssignmentPolicy::LowestLoad => candidates.sort_by(|a, b| {
                a.average_load
                    .partial_cmp(&b.average_load)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.chef_created.cmp(&b.chef_created))
            }),
            AssignmentPolicy::CapacityBased => candidates.sort_by(|a, b| {
                b.total_headroom
                    .cmp(&a.total_headroom)
                    .then(a.chef_created.cmp(&b.chef_created))
            }),
            AssignmentPolicy::RoundRobin => {}
        }

        for candidate in candidates {
            let picked = select_handler(
                candidate.config.overflow_action,
                &candidate.loads,
                candidate.config.max_load,
                candidate.config.round_robin_cursor,
            )
            .map(|h| h.user.clone());
            if let Some(user) = picked {
                return Ok(Some((candidate.team, candidate.config, user)));
            }
        }
        Ok(None)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.publish(notification).await {
            warn!(error = %err, "notification publish failed");
        }
    }
}

struct TeamCandidate {
    team: TeamId,
    chef_created: chrono::DateTime<chrono::Utc>,
    average_load: f64,
    total_headroom: i64,
    config: TeamWorkloadConfig,
    loads: Vec<HandlerLoad>,
}

/// Resolves the per-actor work queues
pub struct CorbeilleService {
    store: Arc<dyn BordereauStore>,
    documents: Arc<dyn DocumentStore>,
    directory: Arc<dyn DirectoryPort>,
    clock: Arc<dyn Clock>,
    completed_window_days: i64,
}

impl CorbeilleService {
    pub fn new(
        store: Arc<dyn BordereauStore>,
        documents: Arc<dyn DocumentStore>,
        directory: Arc<dyn DirectoryPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            documents,
            directory,
            clock,
            completed_window_days: COMPLETED_WINDOW_DAYS,
        }
    }

    /// Overrides the trailing window of the completed bucket
    pub fn with_completed_window(mut self, days: i64) -> Self {
        self.completed_window_days = days.max(1);
        self
    }

    /// The caller's corbeille, from one bounded snapshot
    pub async fn resolve(&self, actor: &Actor) -> Result<Corbeille, DispatchError> {
        let now = self.clock.now();
        let team_members: Vec<UserId> = match actor.led_team() {
            Some(team) => self
                .directory
                .team_members(team)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
            None => Vec::new(),
        };

        let mut rows = self
            .store
            .list_by_statuts(corbeille::open_statuts(actor.role))
            .await?;
        let since = now - Duration::days(self.completed_window_days);
        rows.extend(
            self.store
                .list_recently_updated(
                    corbeille::completed_statuts(actor.role),
                    since,
                    COMPLETED_CAP as i64,
                )
                .await?,
        );

        let ids: Vec<BordereauId> = rows.iter().map(|b| b.id).collect();
        let counts = self.documents.count_for_many(&ids).await?;
        let annotated = rows
            .into_iter()
            .map(|b| {
                let count = counts.get(&b.id).copied().unwrap_or(0);
                (b, count)
            })
            .collect();

        Ok(corbeille::build(
            actor,
            &team_members,
            annotated,
            self.completed_window_days,
            now,
        ))
    }
}
