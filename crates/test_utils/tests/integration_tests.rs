//! Integration Tests for the Bordereau Engine
//!
//! These tests verify cross-crate workflows end to end: the status machine
//! driven through the workflow service, the assignment router with its
//! overflow paths, the corbeille projection and the escalation sweep, all
//! wired over the in-memory adapters.

use std::sync::Arc;

use chrono::Duration;

use core_kernel::{Actor, BordereauId, SlaStatus, UserId};
use domain_bordereau::{
    Bordereau, BordereauStore, CreateBordereau, HistoryAction, NotificationKind, Ownership, Statut,
    WorkflowError, WorkflowService,
};
use domain_dispatch::{
    AssignRequest, AssignmentPolicy, AssignmentService, ConfigUpdate, CorbeilleService,
    DispatchError, EscalationRule, EscalationSweeper, ReassignRequest, RuleCondition,
    TeamConfigStore,
};
use test_utils::assertions::{
    assert_action_count, assert_assigned_to, assert_not_notified, assert_notified, assert_statut,
};
use test_utils::builders::{BordereauBuilder, TeamConfigBuilder, UserBuilder};
use test_utils::fixtures::{ActorFixtures, IdFixtures, StringFixtures, TemporalFixtures};
use test_utils::memory::{
    InMemoryBordereauStore, InMemoryDirectory, InMemoryDocumentStore, InMemoryTeamConfigStore,
    RecordingNotifier, TestClock,
};

/// Every service wired over one shared set of in-memory adapters
struct TestContext {
    store: Arc<InMemoryBordereauStore>,
    directory: Arc<InMemoryDirectory>,
    team_configs: Arc<InMemoryTeamConfigStore>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<TestClock>,
    workflow: WorkflowService,
    assignments: AssignmentService,
    corbeilles: CorbeilleService,
}

impl TestContext {
    fn new() -> Self {
        let store = Arc::new(InMemoryBordereauStore::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let team_configs = Arc::new(InMemoryTeamConfigStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(TestClock::at(TemporalFixtures::reception()));

        let workflow = WorkflowService::new(
            store.clone(),
            documents.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let assignments = AssignmentService::new(
            store.clone(),
            directory.clone(),
            team_configs.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let corbeilles = CorbeilleService::new(
            store.clone(),
            documents.clone(),
            directory.clone(),
            clock.clone(),
        );

        Self {
            store,
            directory,
            team_configs,
            notifier,
            clock,
            workflow,
            assignments,
            corbeilles,
        }
    }

    fn sweeper(&self, rules: Vec<EscalationRule>, batch_size: i64) -> EscalationSweeper {
        EscalationSweeper::new(
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            rules,
            batch_size,
        )
    }

    /// Seeds the fixture team: the chef plus two gestionnaires, the second
    /// created a day later so selection ties break toward the first
    fn seed_fixture_team(&self) {
        self.directory.add(
            UserBuilder::new()
                .with_id(IdFixtures::chef_id())
                .chef()
                .build(),
        );
        self.directory.add(
            UserBuilder::new()
                .with_id(IdFixtures::gestionnaire_id())
                .in_team(IdFixtures::team_id())
                .build(),
        );
        self.directory.add(
            UserBuilder::new()
                .with_id(IdFixtures::senior_id())
                .senior()
                .in_team(IdFixtures::team_id())
                .created_at(TemporalFixtures::days_after(1))
                .build(),
        );
    }

    /// Seeds the sibling team: the other chef plus one fresh gestionnaire
    fn seed_sibling_team(&self) -> UserId {
        let sibling_handler = UserId::new();
        self.directory.add(
            UserBuilder::new()
                .with_id(IdFixtures::other_chef_id())
                .chef()
                .created_at(TemporalFixtures::days_after(2))
                .build(),
        );
        self.directory.add(
            UserBuilder::new()
                .with_id(sibling_handler)
                .in_team(IdFixtures::other_team_id())
                .build(),
        );
        sibling_handler
    }

    /// `load` active files already in progress under the given handler
    fn seed_load(&self, handler: UserId, load: usize) {
        let tag = &handler.to_string()[..4];
        for n in 0..load {
            self.store.seed(
                BordereauBuilder::new()
                    .with_reference(format!("BRD-L{}-{:03}", tag, n))
                    .in_progress_by(handler)
                    .in_team(IdFixtures::team_id())
                    .build(),
            );
        }
    }
}

// ============================================================================
// Full Pipeline
// ============================================================================

mod full_pipeline {
    use super::*;

    /// Drives one bordereau through the whole main chain, one day per
    /// step, and checks statuses, stamps, history and the version trail.
    #[tokio::test]
    async fn test_pipeline_runs_intake_to_cloture() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let bo = ActorFixtures::bo();
        let scan = ActorFixtures::scan_team();
        let chef = ActorFixtures::chef();
        let handler = ActorFixtures::gestionnaire();
        let finance = ActorFixtures::finance();

        let created = ctx
            .workflow
            .create(
                CreateBordereau {
                    reference: StringFixtures::reference().to_string(),
                    client_id: IdFixtures::client_id(),
                    nombre_bs: 12,
                    delai_reglement: None,
                    team_id: None,
                },
                &bo,
            )
            .await
            .unwrap();
        assert_statut(&created, Statut::EnAttente);
        assert_eq!(created.version, 1);

        let id = created.id;

        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::AScanner, None, &bo).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::ScanEnCours, None, &scan).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::Scanne, None, &scan).await.unwrap();

        ctx.clock.advance_days(1);
        let outcome = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(IdFixtures::gestionnaire_id()),
                },
                &chef,
            )
            .await
            .unwrap();
        assert_assigned_to(&outcome.bordereau, IdFixtures::gestionnaire_id());
        assert_eq!(outcome.bordereau.team_id, Some(IdFixtures::team_id()));

        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::EnCours, None, &handler).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::Traite, None, &handler).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::PretVirement, None, &finance).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::VirementEnCours, None, &finance).await.unwrap();
        ctx.clock.advance_days(1);
        ctx.workflow.transition(id, Statut::VirementExecute, None, &finance).await.unwrap();
        ctx.clock.advance_days(1);
        let closed = ctx.workflow.transition(id, Statut::Cloture, None, &chef).await.unwrap();

        assert_statut(&closed, Statut::Cloture);
        assert_eq!(closed.version, 11);
        assert!(closed.date_debut_scan.is_some());
        assert!(closed.date_fin_scan.is_some());
        assert!(closed.date_reception_sante.is_some());
        assert!(closed.date_depot_virement.is_some());
        assert!(closed.date_execution_virement.is_some());
        assert_eq!(closed.date_cloture, Some(TemporalFixtures::days_after(10)));
        assert_eq!(closed.scan_duration_days(), Some(1));
        assert_eq!(closed.total_duration_days(), Some(10));

        let history = ctx.workflow.history(id).await.unwrap();
        assert_eq!(history.len(), 11);
        assert_action_count(&history, HistoryAction::Creation, 1);
        assert_action_count(&history, HistoryAction::Assignment, 1);
        assert_action_count(&history, HistoryAction::Transition, 9);

        let published = ctx.notifier.published();
        assert_notified(&published, NotificationKind::ReadyToScan);
        assert_notified(&published, NotificationKind::ReadyToAssign);
        assert_notified(&published, NotificationKind::Assigned);
        assert_notified(&published, NotificationKind::ReadyForPayment);

        // Closed with twenty days of margin, so both clocks read on time.
        let sla = ctx.workflow.sla_overview(&closed).await.unwrap();
        assert!(sla.processing.settled);
        assert_eq!(sla.processing.status, SlaStatus::OnTime);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected_per_client() {
        let ctx = TestContext::new();
        let bo = ActorFixtures::bo();
        let cmd = CreateBordereau {
            reference: StringFixtures::reference().to_string(),
            client_id: IdFixtures::client_id(),
            nombre_bs: 3,
            delai_reglement: None,
            team_id: None,
        };

        ctx.workflow.create(cmd.clone(), &bo).await.unwrap();
        let err = ctx.workflow.create(cmd, &bo).await.unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateReference { .. }));
    }

    #[tokio::test]
    async fn test_role_outside_the_edge_is_rejected() {
        let ctx = TestContext::new();
        let bo = ActorFixtures::bo();
        let created = ctx
            .workflow
            .create(
                CreateBordereau {
                    reference: StringFixtures::reference().to_string(),
                    client_id: IdFixtures::client_id(),
                    nombre_bs: 3,
                    delai_reglement: None,
                    team_id: None,
                },
                &bo,
            )
            .await
            .unwrap();

        // Intake to scan queue belongs to the back office, not to handlers.
        let err = ctx
            .workflow
            .transition(created.id, Statut::AScanner, None, &ActorFixtures::gestionnaire())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnauthorizedTransition { .. }));

        let unchanged = ctx.workflow.get(created.id).await.unwrap();
        assert_statut(&unchanged, Statut::EnAttente);
        assert_eq!(unchanged.version, 1);
    }

    #[tokio::test]
    async fn test_rejection_requires_a_reason() {
        let ctx = TestContext::new();
        let handler = ActorFixtures::gestionnaire();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());

        let err = ctx
            .workflow
            .transition(file.id, Statut::Rejete, None, &handler)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ReasonRequired { .. }));

        let rejected = ctx
            .workflow
            .reject(file.id, StringFixtures::reason().to_string(), &handler)
            .await
            .unwrap();
        assert_statut(&rejected, Statut::Rejete);
        assert!(rejected.ownership.assigned_to().is_none());
        assert_notified(&ctx.notifier.published(), NotificationKind::Rejected);
    }
}

// ============================================================================
// Assignment Routing
// ============================================================================

mod assignment_routing {
    use super::*;

    fn scanned_file() -> Bordereau {
        BordereauBuilder::new()
            .with_statut(Statut::Scanne)
            .in_team(IdFixtures::team_id())
            .build()
    }

    #[tokio::test]
    async fn test_lowest_load_routes_to_least_busy_handler() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.seed_load(IdFixtures::gestionnaire_id(), 3);
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let outcome = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: None,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.handler.id, IdFixtures::senior_id());
        assert_assigned_to(&outcome.bordereau, IdFixtures::senior_id());
        let published = ctx.notifier.published();
        assert_notified(&published, NotificationKind::Assigned);
        // The outbox records the chef who routed the file.
        let assigned = published
            .iter()
            .find(|n| n.kind == NotificationKind::Assigned)
            .unwrap();
        assert_eq!(assigned.actor_id, Some(ActorFixtures::chef().user_id));
    }

    #[tokio::test]
    async fn test_round_robin_walks_the_ring() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.team_configs.seed(
            TeamConfigBuilder::new()
                .with_overflow_action(AssignmentPolicy::RoundRobin)
                .build(),
        );
        let chef = ActorFixtures::chef();

        let mut picks = Vec::new();
        for n in 0..3 {
            let file = BordereauBuilder::new()
                .with_reference(format!("BRD-2025-8{:03}", n))
                .with_statut(Statut::Scanne)
                .in_team(IdFixtures::team_id())
                .build();
            ctx.store.seed(file.clone());
            let outcome = ctx
                .assignments
                .assign(
                    AssignRequest {
                        bordereau_id: file.id,
                        team_id: None,
                        policy: None,
                        assigned_to: None,
                    },
                    &chef,
                )
                .await
                .unwrap();
            picks.push(outcome.handler.id);
        }

        // The ring starts at the earliest-created handler and wraps.
        assert_eq!(
            picks,
            vec![
                IdFixtures::gestionnaire_id(),
                IdFixtures::senior_id(),
                IdFixtures::gestionnaire_id(),
            ]
        );
        let config = ctx
            .team_configs
            .get(IdFixtures::team_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.round_robin_cursor, Some(IdFixtures::gestionnaire_id()));
    }

    #[tokio::test]
    async fn test_direct_pick_bypasses_the_ceiling() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.team_configs.seed(TeamConfigBuilder::new().with_max_load(1).build());
        ctx.seed_load(IdFixtures::gestionnaire_id(), 1);
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let outcome = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(IdFixtures::gestionnaire_id()),
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();
        assert_assigned_to(&outcome.bordereau, IdFixtures::gestionnaire_id());
    }

    #[tokio::test]
    async fn test_inactive_direct_pick_is_ineligible() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let dormant = UserId::new();
        ctx.directory.add(
            UserBuilder::new()
                .with_id(dormant)
                .in_team(IdFixtures::team_id())
                .inactive()
                .build(),
        );
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let err = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(dormant),
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::IneligibleAssignee { .. }));
    }

    #[tokio::test]
    async fn test_team_without_handlers_reports_empty_pool() {
        let ctx = TestContext::new();
        // Only the chef exists; nobody can take the file.
        ctx.directory.add(
            UserBuilder::new()
                .with_id(IdFixtures::chef_id())
                .chef()
                .build(),
        );
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let err = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: None,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyPool { .. }));
    }

    #[tokio::test]
    async fn test_overflow_without_auto_reassign_reports_saturation() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.team_configs.seed(
            TeamConfigBuilder::new()
                .with_max_load(1)
                .auto_reassign(false)
                .build(),
        );
        ctx.seed_load(IdFixtures::gestionnaire_id(), 1);
        ctx.seed_load(IdFixtures::senior_id(), 1);
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let err = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: None,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Overflow { max_load: 1, .. }));
        assert_notified(&ctx.notifier.published(), NotificationKind::TeamOverload);
        // The file never moved.
        let untouched = ctx.store.get(file.id).await.unwrap();
        assert_statut(&untouched, Statut::Scanne);
        assert_eq!(untouched.version, file.version);
    }

    #[tokio::test]
    async fn test_overflow_reroutes_toward_sibling_headroom() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let sibling_handler = ctx.seed_sibling_team();
        ctx.team_configs.seed(TeamConfigBuilder::new().with_max_load(1).build());
        ctx.seed_load(IdFixtures::gestionnaire_id(), 1);
        ctx.seed_load(IdFixtures::senior_id(), 1);
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let outcome = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: None,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.handler.id, sibling_handler);
        assert_eq!(outcome.bordereau.team_id, Some(IdFixtures::other_team_id()));
        let published = ctx.notifier.published();
        assert_notified(&published, NotificationKind::TeamOverload);
        assert_notified(&published, NotificationKind::Assigned);
    }

    #[tokio::test]
    async fn test_overflow_dead_end_asks_for_escalation() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.team_configs.seed(TeamConfigBuilder::new().with_max_load(1).build());
        ctx.seed_load(IdFixtures::gestionnaire_id(), 1);
        ctx.seed_load(IdFixtures::senior_id(), 1);
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let err = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: None,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Overflow { .. }));
        assert_notified(&ctx.notifier.published(), NotificationKind::EscalationRequired);
    }

    #[tokio::test]
    async fn test_bulk_assign_continues_past_failures() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let first = scanned_file();
        let second = BordereauBuilder::new()
            .with_reference(StringFixtures::other_reference())
            .with_statut(Statut::AAffecter)
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(first.clone());
        ctx.store.seed(second.clone());
        let missing = BordereauId::new();

        let report = ctx
            .assignments
            .bulk_assign(
                vec![first.id, missing, second.id],
                IdFixtures::gestionnaire_id(),
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        assert_eq!(report.assigned, vec![first.id, second.id]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].bordereau_id, missing);
        assert_assigned_to(
            &ctx.store.get(first.id).await.unwrap(),
            IdFixtures::gestionnaire_id(),
        );
        assert_action_count(
            &ctx.store.all_history(),
            HistoryAction::BulkAssignment,
            2,
        );
    }

    #[tokio::test]
    async fn test_bulk_assign_respects_the_projected_ceiling() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.team_configs.seed(TeamConfigBuilder::new().with_max_load(2).build());
        let files: Vec<_> = (0..3)
            .map(|n| {
                let file = BordereauBuilder::new()
                    .with_reference(format!("BRD-2025-7{:03}", n))
                    .with_statut(Statut::Scanne)
                    .in_team(IdFixtures::team_id())
                    .build();
                ctx.store.seed(file.clone());
                file
            })
            .collect();

        let report = ctx
            .assignments
            .bulk_assign(
                files.iter().map(|f| f.id).collect(),
                IdFixtures::gestionnaire_id(),
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        assert_eq!(report.assigned.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("ceiling"));
        assert_statut(
            &ctx.store.get(files[2].id).await.unwrap(),
            Statut::Scanne,
        );
    }

    #[tokio::test]
    async fn test_reassign_swaps_handler_in_place() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());

        let outcome = ctx
            .assignments
            .reassign(
                ReassignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(IdFixtures::senior_id()),
                    reason: "charge de travail".to_string(),
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        // Statut survives the swap; only the pair changes.
        assert_statut(&outcome.bordereau, Statut::EnCours);
        assert_eq!(
            outcome.bordereau.ownership.assigned_to(),
            Some(IdFixtures::senior_id())
        );
        assert_eq!(outcome.bordereau.version, file.version + 1);

        let history = ctx.store.all_history();
        assert_action_count(&history, HistoryAction::Reassignment, 1);
        let record = history
            .iter()
            .find(|h| h.action == HistoryAction::Reassignment)
            .unwrap();
        assert_eq!(record.reason.as_deref(), Some("charge de travail"));
    }

    #[tokio::test]
    async fn test_reassign_rejects_files_nobody_holds() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let file = scanned_file();
        ctx.store.seed(file.clone());

        let err = ctx
            .assignments
            .reassign(
                ReassignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(IdFixtures::senior_id()),
                    reason: "charge de travail".to_string(),
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }
}

// ============================================================================
// Corbeille Projection
// ============================================================================

mod corbeille_projection {
    use super::*;

    #[tokio::test]
    async fn test_gestionnaire_sees_only_their_work() {
        let ctx = TestContext::new();
        let me = IdFixtures::gestionnaire_id();
        let someone_else = IdFixtures::senior_id();

        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0001")
                .assigned_to(me)
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0002")
                .in_progress_by(me)
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0003")
                .in_progress_by(someone_else)
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0004")
                .in_progress_by(me)
                .archived()
                .build(),
        );

        let corbeille = ctx
            .corbeilles
            .resolve(&ActorFixtures::gestionnaire())
            .await
            .unwrap();

        assert_eq!(corbeille.stats.ready, 1);
        assert_eq!(corbeille.stats.in_progress, 1);
        assert_eq!(corbeille.stats.completed, 0);
        assert_eq!(corbeille.ready[0].bordereau.reference, "BRD-2025-0001");
        assert_eq!(corbeille.in_progress[0].bordereau.reference, "BRD-2025-0002");
    }

    #[tokio::test]
    async fn test_completed_bucket_respects_the_window() {
        let ctx = TestContext::new();
        let me = IdFixtures::gestionnaire_id();
        ctx.clock.set(TemporalFixtures::days_after(20));

        let fresh = BordereauBuilder::new()
            .with_reference("BRD-2025-0010")
            .with_statut(Statut::Traite)
            .with_ownership(Ownership::working(me))
            .updated_at(TemporalFixtures::days_after(18))
            .build();
        let stale = BordereauBuilder::new()
            .with_reference("BRD-2025-0011")
            .with_statut(Statut::Traite)
            .with_ownership(Ownership::working(me))
            .updated_at(TemporalFixtures::days_after(2))
            .build();
        ctx.store.seed(fresh.clone());
        ctx.store.seed(stale);

        let corbeille = ctx
            .corbeilles
            .resolve(&ActorFixtures::gestionnaire())
            .await
            .unwrap();

        assert_eq!(corbeille.stats.completed, 1);
        assert_eq!(corbeille.completed[0].bordereau.id, fresh.id);
    }

    #[tokio::test]
    async fn test_chef_sees_team_scope() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        ctx.seed_sibling_team();
        let team = IdFixtures::team_id();

        // Unrouted scanned file: visible to any chef until one takes it.
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0020")
                .with_statut(Statut::Scanne)
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0021")
                .with_statut(Statut::AAffecter)
                .in_team(team)
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0022")
                .with_statut(Statut::EnDifficulte)
                .in_team(team)
                .build(),
        );
        // A member's active file lands in the chef's in-progress bucket.
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0023")
                .in_progress_by(IdFixtures::gestionnaire_id())
                .in_team(team)
                .build(),
        );
        // Another team's custody stays out of this corbeille.
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0024")
                .with_statut(Statut::AAffecter)
                .in_team(IdFixtures::other_team_id())
                .build(),
        );

        let corbeille = ctx.corbeilles.resolve(&ActorFixtures::chef()).await.unwrap();

        assert_eq!(corbeille.stats.ready, 3);
        assert_eq!(corbeille.stats.in_progress, 1);
        let refs: Vec<&str> = corbeille
            .ready
            .iter()
            .map(|i| i.bordereau.reference.as_str())
            .collect();
        assert!(!refs.contains(&"BRD-2025-0024"));
    }

    #[tokio::test]
    async fn test_finance_sees_the_payment_pipeline() {
        let ctx = TestContext::new();
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0030")
                .with_statut(Statut::Traite)
                .with_ownership(Ownership::working(
                    IdFixtures::gestionnaire_id(),
                ))
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0031")
                .with_statut(Statut::PretVirement)
                .with_ownership(Ownership::working(
                    IdFixtures::gestionnaire_id(),
                ))
                .build(),
        );
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0032")
                .with_statut(Statut::VirementEnCours)
                .with_ownership(Ownership::working(
                    IdFixtures::gestionnaire_id(),
                ))
                .build(),
        );

        let corbeille = ctx.corbeilles.resolve(&ActorFixtures::finance()).await.unwrap();

        assert_eq!(corbeille.stats.ready, 2);
        assert_eq!(corbeille.stats.in_progress, 1);
    }

    #[tokio::test]
    async fn test_stats_count_deadline_pressure() {
        let ctx = TestContext::new();
        let me = IdFixtures::gestionnaire_id();
        ctx.clock.set(TemporalFixtures::days_after(40));

        // Received at day 12: 28 elapsed, inside the warning band.
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0040")
                .received_at(TemporalFixtures::days_after(12))
                .assigned_to(me)
                .build(),
        );
        // Received at day 5: 35 elapsed, past the deadline.
        ctx.store.seed(
            BordereauBuilder::new()
                .with_reference("BRD-2025-0041")
                .received_at(TemporalFixtures::days_after(5))
                .in_progress_by(me)
                .build(),
        );

        let corbeille = ctx
            .corbeilles
            .resolve(&ActorFixtures::gestionnaire())
            .await
            .unwrap();

        assert_eq!(corbeille.stats.at_risk, 1);
        assert_eq!(corbeille.stats.overdue, 1);
        // Open buckets are ordered oldest intake first.
        assert_eq!(corbeille.ready[0].sla.status, SlaStatus::AtRisk);
        assert_eq!(corbeille.in_progress[0].sla.status, SlaStatus::Overdue);
    }
}

// ============================================================================
// Escalation Sweep
// ============================================================================

mod escalation_sweep {
    use super::*;

    #[tokio::test]
    async fn test_sweep_escalates_overdue_files() {
        let ctx = TestContext::new();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        let sweeper = ctx.sweeper(Vec::new(), 100);

        let report = sweeper.run_sweep().await.unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.escalated, 1);
        assert_eq!(report.failed, 0);

        let escalated = ctx.store.get(file.id).await.unwrap();
        assert_statut(&escalated, Statut::EnDifficulte);
        // Sweep runs leave the file unassigned for chef triage.
        assert!(escalated.ownership.assigned_to().is_none());
        assert!(escalated.ownership.current_handler().is_none());

        let history = ctx.store.all_history();
        assert_action_count(&history, HistoryAction::Escalation, 1);
        let record = history
            .iter()
            .find(|h| h.action == HistoryAction::Escalation)
            .unwrap();
        assert_eq!(record.sweep_id, Some(report.sweep_id));

        let published = ctx.notifier.for_bordereau(file.id);
        assert_notified(&published, NotificationKind::Escalated);
    }

    #[tokio::test]
    async fn test_sweep_replay_is_idempotent() {
        let ctx = TestContext::new();
        for n in 0..3 {
            ctx.store.seed(
                BordereauBuilder::new()
                    .with_reference(format!("BRD-2025-6{:03}", n))
                    .in_progress_by(IdFixtures::gestionnaire_id())
                    .build(),
            );
        }
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        let sweeper = ctx.sweeper(Vec::new(), 100);

        let first = sweeper.run_sweep().await.unwrap();
        assert_eq!(first.escalated, 3);

        let second = sweeper.run_sweep().await.unwrap();
        assert_eq!(second.escalated, 0);
        assert_eq!(second.skipped, 3);
        assert_action_count(&ctx.store.all_history(), HistoryAction::Escalation, 3);
    }

    #[tokio::test]
    async fn test_sweep_warns_inside_the_band_without_moving() {
        let ctx = TestContext::new();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .in_team(IdFixtures::team_id())
            .updated_at(TemporalFixtures::days_after(27))
            .build();
        ctx.store.seed(file.clone());
        // Two days of margin left on the default thirty-day window.
        ctx.clock.set(TemporalFixtures::days_after(28));
        let sweeper = ctx.sweeper(EscalationRule::defaults(), 100);

        let report = sweeper.run_sweep().await.unwrap();

        assert_eq!(report.warned, 1);
        assert_eq!(report.escalated, 0);
        assert_statut(&ctx.store.get(file.id).await.unwrap(), Statut::EnCours);

        let published = ctx.notifier.for_bordereau(file.id);
        assert_notified(&published, NotificationKind::SlaWarning);
        let warning = published
            .iter()
            .find(|n| n.kind == NotificationKind::SlaWarning)
            .unwrap();
        assert_eq!(warning.sweep_id, Some(report.sweep_id));
        assert_eq!(warning.actor_id, Some(Actor::system().user_id));
    }

    #[tokio::test]
    async fn test_stuck_rule_escalates_idle_files() {
        let ctx = TestContext::new();
        // Sixty days of contractual margin, but idle for eighteen.
        let file = BordereauBuilder::new()
            .with_delai(60)
            .in_progress_by(IdFixtures::gestionnaire_id())
            .updated_at(TemporalFixtures::days_after(2))
            .build();
        ctx.store.seed(file.clone());
        ctx.clock.set(TemporalFixtures::days_after(20));
        let rules = vec![EscalationRule::new(
            "dossier immobile",
            RuleCondition::StuckInStatus {
                statut: Statut::EnCours,
                min_days: 14,
            },
        )];
        let sweeper = ctx.sweeper(rules, 100);

        let report = sweeper.run_sweep().await.unwrap();

        assert_eq!(report.escalated, 1);
        assert_statut(&ctx.store.get(file.id).await.unwrap(), Statut::EnDifficulte);
    }

    #[tokio::test]
    async fn test_sweep_counts_lost_races_as_failed() {
        let ctx = TestContext::new();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .build();
        ctx.store.seed(file.clone());
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        ctx.store.conflict_next_update();
        let sweeper = ctx.sweeper(Vec::new(), 100);

        let report = sweeper.run_sweep().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.escalated, 0);
        assert_statut(&ctx.store.get(file.id).await.unwrap(), Statut::EnCours);

        // The next pass, with the race gone, finishes the job.
        let retry = sweeper.run_sweep().await.unwrap();
        assert_eq!(retry.escalated, 1);
        assert_eq!(retry.failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_pages_through_the_open_set() {
        let ctx = TestContext::new();
        for n in 0..5 {
            ctx.store.seed(
                BordereauBuilder::new()
                    .with_reference(format!("BRD-2025-5{:03}", n))
                    .in_progress_by(IdFixtures::gestionnaire_id())
                    .build(),
            );
        }
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        let sweeper = ctx.sweeper(Vec::new(), 2);

        let report = sweeper.run_sweep().await.unwrap();
        assert_eq!(report.scanned, 5);
        assert_eq!(report.escalated, 5);
    }

    #[tokio::test]
    async fn test_closed_files_stay_out_of_the_sweep() {
        let ctx = TestContext::new();
        ctx.store.seed(
            BordereauBuilder::new()
                .closed_at(TemporalFixtures::days_after(3))
                .build(),
        );
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        let sweeper = ctx.sweeper(Vec::new(), 100);

        let report = sweeper.run_sweep().await.unwrap();
        assert_eq!(report.scanned, 0);
        assert_not_notified(&ctx.notifier.published(), NotificationKind::Escalated);
    }
}

// ============================================================================
// Optimistic Concurrency
// ============================================================================

mod optimistic_concurrency {
    use super::*;

    /// Two chefs race one scanned file; the guarded write lets exactly one
    /// assignment through and the loser sees the moved state.
    #[tokio::test]
    async fn test_second_assignment_of_the_same_file_loses() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let file = BordereauBuilder::new()
            .with_statut(Statut::Scanne)
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());
        let req = AssignRequest {
            bordereau_id: file.id,
            team_id: None,
            policy: None,
            assigned_to: Some(IdFixtures::gestionnaire_id()),
        };

        ctx.assignments.assign(req.clone(), &ActorFixtures::chef()).await.unwrap();
        let err = ctx
            .assignments
            .assign(req, &ActorFixtures::chef())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Workflow(WorkflowError::InvalidTransition { .. })
        ));
        assert_assigned_to(
            &ctx.store.get(file.id).await.unwrap(),
            IdFixtures::gestionnaire_id(),
        );
    }

    /// A write that lost the version race surfaces as a conflict, and a
    /// fresh read shows the winner's state.
    #[tokio::test]
    async fn test_lost_version_race_surfaces_as_conflict() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let file = BordereauBuilder::new()
            .with_statut(Statut::Scanne)
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());
        ctx.store.conflict_next_update();

        let err = ctx
            .assignments
            .assign(
                AssignRequest {
                    bordereau_id: file.id,
                    team_id: None,
                    policy: None,
                    assigned_to: Some(IdFixtures::gestionnaire_id()),
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Workflow(WorkflowError::Conflict(_))
        ));
        assert_statut(&ctx.store.get(file.id).await.unwrap(), Statut::Scanne);
    }
}

// ============================================================================
// Archive Projection
// ============================================================================

mod archive_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_archived_files_leave_every_projection() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();
        let file = BordereauBuilder::new()
            .in_progress_by(IdFixtures::gestionnaire_id())
            .in_team(IdFixtures::team_id())
            .build();
        ctx.store.seed(file.clone());
        let chef = ActorFixtures::chef();

        let archived = ctx.workflow.archive(file.id, &chef).await.unwrap();
        assert!(archived.archived);

        // Gone from the corbeille and from the sweep's open set.
        let corbeille = ctx
            .corbeilles
            .resolve(&ActorFixtures::gestionnaire())
            .await
            .unwrap();
        assert_eq!(corbeille.stats.in_progress, 0);
        ctx.clock.set(TemporalFixtures::past_processing_sla());
        let report = ctx.sweeper(Vec::new(), 100).run_sweep().await.unwrap();
        assert_eq!(report.scanned, 0);

        // Restore brings it back with its full history.
        let restored = ctx.workflow.restore(file.id, &chef).await.unwrap();
        assert!(!restored.archived);
        let history = ctx.workflow.history(file.id).await.unwrap();
        assert_action_count(&history, HistoryAction::Archive, 1);
        assert_action_count(&history, HistoryAction::Restore, 1);
    }

    #[tokio::test]
    async fn test_archive_is_reserved_to_leads() {
        let ctx = TestContext::new();
        let file = BordereauBuilder::new().build();
        ctx.store.seed(file.clone());

        let err = ctx
            .workflow
            .archive(file.id, &ActorFixtures::gestionnaire())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(!ctx.store.get(file.id).await.unwrap().archived);
    }
}

// ============================================================================
// Team Configuration
// ============================================================================

mod team_configuration {
    use super::*;

    #[tokio::test]
    async fn test_chef_tunes_their_own_team() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();

        let updated = ctx
            .assignments
            .put_team_config(
                IdFixtures::team_id(),
                ConfigUpdate {
                    max_load: 15,
                    auto_reassign_enabled: false,
                    overflow_action: AssignmentPolicy::RoundRobin,
                    alert_threshold: 10,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap();

        assert_eq!(updated.max_load, 15);
        assert_eq!(updated.overflow_action, AssignmentPolicy::RoundRobin);
        assert_eq!(updated.updated_by, Some(IdFixtures::chef_id()));

        // The stored copy now drives workload analysis.
        let workload = ctx
            .assignments
            .team_workload(IdFixtures::team_id())
            .await
            .unwrap();
        assert_eq!(workload.max_load, 15);
    }

    #[tokio::test]
    async fn test_foreign_chef_may_not_tune_the_team() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();

        let err = ctx
            .assignments
            .put_team_config(
                IdFixtures::team_id(),
                ConfigUpdate {
                    max_load: 15,
                    auto_reassign_enabled: true,
                    overflow_action: AssignmentPolicy::LowestLoad,
                    alert_threshold: 10,
                },
                &ActorFixtures::other_chef(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_ceiling_is_rejected() {
        let ctx = TestContext::new();
        ctx.seed_fixture_team();

        let err = ctx
            .assignments
            .put_team_config(
                IdFixtures::team_id(),
                ConfigUpdate {
                    max_load: 0,
                    auto_reassign_enabled: true,
                    overflow_action: AssignmentPolicy::LowestLoad,
                    alert_threshold: 10,
                },
                &ActorFixtures::chef(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }
}
