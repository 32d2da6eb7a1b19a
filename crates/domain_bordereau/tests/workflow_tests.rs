//! Comprehensive tests for domain_bordereau

use chrono::{DateTime, Duration, TimeZone, Utc};

use core_kernel::{Actor, ClientId, Role, SweepId, UserId};

use domain_bordereau::bordereau::{Bordereau, TransitionCommand};
use domain_bordereau::error::WorkflowError;
use domain_bordereau::history::HistoryAction;
use domain_bordereau::ownership::Ownership;
use domain_bordereau::statut::Statut;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap()
}

fn fresh() -> Bordereau {
    Bordereau::receive("BDX-2025-1001", ClientId::new(), 30, Some(30), None, t0()).unwrap()
}

/// A bordereau forced into `statut` with an ownership pair that fits it
fn in_state(statut: Statut) -> Bordereau {
    let mut bordereau = fresh();
    bordereau.statut = statut;
    bordereau.ownership = match statut {
        s if s.is_active_handling() => Ownership::working(UserId::new()),
        _ => Ownership::unassigned(),
    };
    bordereau
}

fn admin() -> Actor {
    Actor::new(UserId::new(), Role::SuperAdmin)
}

// ============================================================================
// Adjacency Table Tests
// ============================================================================

mod adjacency_tests {
    use super::*;

    /// Every (from, to) pair: legal edges succeed for the super-admin,
    /// illegal ones reject and leave the entity untouched.
    #[test]
    fn test_full_cross_product_matches_the_table() {
        for from in Statut::ALL {
            for to in Statut::ALL {
                let bordereau = in_state(from);
                let cmd = TransitionCommand::new(to, admin(), t0() + Duration::hours(1))
                    .with_reason("test coverage")
                    .with_assignee(UserId::new());
                let result = bordereau.transition(cmd);

                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from} -> {to} should succeed");
                } else {
                    match result {
                        Err(WorkflowError::InvalidTransition { .. }) => {}
                        other => panic!("{from} -> {to} expected InvalidTransition, got {other:?}"),
                    }
                    // The source value is untouched by a refused command.
                    assert_eq!(bordereau.statut, from);
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits_besides_closure() {
        for to in Statut::ALL {
            assert!(!Statut::Cloture.can_transition_to(to));
        }
        let exits: Vec<Statut> = Statut::ALL
            .into_iter()
            .filter(|to| Statut::VirementExecute.can_transition_to(*to))
            .collect();
        assert_eq!(exits, vec![Statut::Cloture]);
    }

    #[test]
    fn test_stage_skips_are_illegal() {
        assert!(!Statut::EnAttente.can_transition_to(Statut::ScanEnCours));
        assert!(!Statut::AScanner.can_transition_to(Statut::Scanne));
        assert!(!Statut::Assigne.can_transition_to(Statut::Traite));
        assert!(!Statut::Traite.can_transition_to(Statut::VirementExecute));
    }
}

// ============================================================================
// Pipeline Walk Tests
// ============================================================================

mod pipeline_tests {
    use super::*;

    struct Desk {
        bo: Actor,
        scan: Actor,
        chef: Actor,
        gestionnaire: Actor,
        finance: Actor,
    }

    fn desk() -> Desk {
        Desk {
            bo: Actor::new(UserId::new(), Role::Bo),
            scan: Actor::new(UserId::new(), Role::ScanTeam),
            chef: Actor::new(UserId::new(), Role::ChefEquipe),
            gestionnaire: Actor::new(UserId::new(), Role::Gestionnaire),
            finance: Actor::new(UserId::new(), Role::Finance),
        }
    }

    fn step(b: Bordereau, target: Statut, actor: Actor, at: DateTime<Utc>) -> Bordereau {
        let from = b.statut;
        b.transition(TransitionCommand::new(target, actor, at))
            .unwrap_or_else(|e| panic!("{from} -> {target} failed: {e}"))
            .bordereau
    }

    #[test]
    fn test_happy_path_stamps_every_canonical_timestamp() {
        let d = desk();
        let day = |n: i64| t0() + Duration::days(n);

        let b = fresh();
        let b = step(b, Statut::AScanner, d.bo, day(0));
        let b = step(b, Statut::ScanEnCours, d.scan, day(1));
        let b = step(b, Statut::Scanne, d.scan, day(2));
        let b = step(b, Statut::AAffecter, d.scan, day(2));
        let b = b
            .transition(
                TransitionCommand::new(Statut::Assigne, d.chef, day(3))
                    .with_assignee(d.gestionnaire.user_id),
            )
            .unwrap()
            .bordereau;
        let b = step(b, Statut::EnCours, d.gestionnaire, day(4));
        let b = step(b, Statut::Traite, d.gestionnaire, day(8));
        let b = step(b, Statut::PretVirement, d.finance, day(9));
        let b = step(b, Statut::VirementEnCours, d.finance, day(10));
        let b = step(b, Statut::VirementExecute, d.finance, day(12));
        let b = step(b, Statut::Cloture, d.finance, day(13));

        assert_eq!(b.statut, Statut::Cloture);
        assert_eq!(b.date_debut_scan, Some(day(1)));
        assert_eq!(b.date_fin_scan, Some(day(2)));
        assert_eq!(b.date_reception_sante, Some(day(3)));
        assert_eq!(b.date_depot_virement, Some(day(10)));
        assert_eq!(b.date_execution_virement, Some(day(12)));
        assert_eq!(b.date_cloture, Some(day(13)));
        assert_eq!(b.scan_duration_days(), Some(1));
        assert_eq!(b.total_duration_days(), Some(13));
    }

    #[test]
    fn test_reentry_does_not_restamp() {
        let d = desk();
        let day = |n: i64| t0() + Duration::days(n);

        let b = fresh();
        let b = step(b, Statut::AScanner, d.bo, day(0));
        let b = step(b, Statut::ScanEnCours, d.scan, day(1));
        let b = step(b, Statut::Scanne, d.scan, day(2));
        let b = b
            .transition(
                TransitionCommand::new(Statut::Assigne, d.chef, day(3))
                    .with_assignee(d.gestionnaire.user_id),
            )
            .unwrap()
            .bordereau;
        // Returned to the chef, then re-dispatched two days later.
        let b = b
            .transition(
                TransitionCommand::new(Statut::EnDifficulte, d.chef, day(4))
                    .with_reason("blondereau illisible"),
            )
            .unwrap()
            .bordereau;
        let b = b
            .transition(
                TransitionCommand::new(Statut::Assigne, d.chef, day(6))
                    .with_assignee(d.gestionnaire.user_id),
            )
            .unwrap()
            .bordereau;

        // First entry wins; the re-entry keeps the day-3 stamp.
        assert_eq!(b.date_reception_sante, Some(day(3)));
    }

    #[test]
    fn test_payment_retry_loop() {
        let d = desk();
        let b = in_state(Statut::VirementEnCours);

        let b = b
            .transition(
                TransitionCommand::new(Statut::VirementRejete, d.finance, t0())
                    .with_reason("rib errone"),
            )
            .unwrap()
            .bordereau;
        assert_eq!(b.statut, Statut::VirementRejete);

        let b = step(b, Statut::VirementEnCours, d.finance, t0() + Duration::days(1));
        assert_eq!(b.statut, Statut::VirementEnCours);
        assert_eq!(b.date_depot_virement, Some(t0() + Duration::days(1)));
    }

    #[test]
    fn test_wrong_desk_cannot_advance_the_file() {
        let d = desk();
        let b = in_state(Statut::Traite);

        let err = b
            .transition(TransitionCommand::new(Statut::PretVirement, d.gestionnaire, t0()))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnauthorizedTransition { .. }));

        assert!(b
            .transition(TransitionCommand::new(Statut::PretVirement, d.finance, t0()))
            .is_ok());
    }
}

// ============================================================================
// Side Branch Tests
// ============================================================================

mod side_branch_tests {
    use super::*;

    #[test]
    fn test_rejete_reachable_from_every_open_state() {
        let chef = Actor::new(UserId::new(), Role::ChefEquipe);
        for from in Statut::ALL {
            if from.is_terminal() || from == Statut::Rejete {
                continue;
            }
            let b = in_state(from);
            let result = b.transition(
                TransitionCommand::new(Statut::Rejete, chef, t0()).with_reason("doublon"),
            );
            assert!(result.is_ok(), "reject from {from} failed: {result:?}");
            assert_eq!(result.unwrap().bordereau.ownership, Ownership::unassigned());
        }
    }

    #[test]
    fn test_terminal_states_cannot_be_rejected() {
        let chef = Actor::new(UserId::new(), Role::ChefEquipe);
        for from in [Statut::Cloture, Statut::VirementExecute] {
            let b = in_state(from);
            let err = b
                .transition(TransitionCommand::new(Statut::Rejete, chef, t0()).with_reason("x"))
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn test_chef_holding_an_escalated_file_is_recorded() {
        let chef = Actor::new(UserId::new(), Role::ChefEquipe);
        let b = in_state(Statut::EnCours);

        let out = b
            .transition(
                TransitionCommand::new(Statut::EnDifficulte, chef, t0())
                    .with_reason("attente piece client"),
            )
            .unwrap();
        assert_eq!(out.bordereau.ownership.assigned_to(), None);
        assert_eq!(out.bordereau.ownership.current_handler(), Some(chef.user_id));
    }

    #[test]
    fn test_handler_return_leaves_no_holder() {
        let handler = UserId::new();
        let mut b = in_state(Statut::EnCours);
        b.ownership = Ownership::working(handler);

        let actor = Actor::new(handler, Role::Gestionnaire);
        let out = b
            .transition(
                TransitionCommand::new(Statut::EnDifficulte, actor, t0())
                    .with_reason("montant incoherent"),
            )
            .unwrap();
        assert_eq!(out.bordereau.ownership, Ownership::unassigned());
    }

    #[test]
    fn test_sweep_command_is_labelled_escalation() {
        let sweep_id = SweepId::new_v7();
        let b = in_state(Statut::EnCours);

        let out = b
            .transition(
                TransitionCommand::new(Statut::EnDifficulte, Actor::system(), t0())
                    .with_reason("deadline depassee")
                    .from_sweep(sweep_id),
            )
            .unwrap();
        assert_eq!(out.history.action, HistoryAction::Escalation);
        assert_eq!(out.history.sweep_id, Some(sweep_id));
        // The sweep leaves the file for triage rather than holding it.
        assert_eq!(out.bordereau.ownership, Ownership::unassigned());
        assert!(out
            .notifications
            .iter()
            .all(|n| n.sweep_id == Some(sweep_id)));
        assert!(out
            .notifications
            .iter()
            .all(|n| n.actor_id == Some(Actor::system().user_id)));
    }
}

// ============================================================================
// History Tests
// ============================================================================

mod history_tests {
    use super::*;

    #[test]
    fn test_exactly_one_record_per_success() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let out = fresh()
            .transition(TransitionCommand::new(Statut::AScanner, bo, t0()))
            .unwrap();

        assert_eq!(out.history.bordereau_id, out.bordereau.id);
        assert_eq!(out.history.user_id, bo.user_id);
        assert_eq!(out.history.from_statut, Some(Statut::EnAttente));
        assert_eq!(out.history.to_statut, Some(Statut::AScanner));
    }

    #[test]
    fn test_assignment_record_names_the_handler() {
        let chef = Actor::new(UserId::new(), Role::ChefEquipe);
        let handler = UserId::new();
        let out = in_state(Statut::AAffecter)
            .transition(
                TransitionCommand::new(Statut::Assigne, chef, t0())
                    .with_assignee(handler)
                    .with_action(HistoryAction::Assignment),
            )
            .unwrap();

        assert_eq!(out.history.action, HistoryAction::Assignment);
        assert_eq!(out.history.assigned_to, Some(handler));
    }

    #[test]
    fn test_reason_is_carried_verbatim() {
        let chef = Actor::new(UserId::new(), Role::ChefEquipe);
        let out = in_state(Statut::EnCours)
            .transition(
                TransitionCommand::new(Statut::Rejete, chef, t0())
                    .with_reason("  reference client absente  "),
            )
            .unwrap();
        assert_eq!(out.history.reason.as_deref(), Some("reference client absente"));
    }

    #[test]
    fn test_creation_record_has_no_from_statut() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let b = fresh();
        let record = b.creation_record(&bo);

        assert_eq!(record.action, HistoryAction::Creation);
        assert_eq!(record.from_statut, None);
        assert_eq!(record.to_statut, Some(Statut::EnAttente));
    }
}

// ============================================================================
// Serialization Tests
// ============================================================================

mod serde_tests {
    use super::*;

    #[test]
    fn test_statut_wire_form_is_screaming_snake() {
        let json = serde_json::to_string(&Statut::VirementEnCours).unwrap();
        assert_eq!(json, "\"VIREMENT_EN_COURS\"");

        let back: Statut = serde_json::from_str("\"EN_DIFFICULTE\"").unwrap();
        assert_eq!(back, Statut::EnDifficulte);
    }

    #[test]
    fn test_bordereau_json_round_trip() {
        let bordereau = in_state(Statut::EnCours);
        let json = serde_json::to_string(&bordereau).unwrap();
        let back: Bordereau = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bordereau);
    }

    #[test]
    fn test_every_statut_survives_serde() {
        for statut in Statut::ALL {
            let json = serde_json::to_string(&statut).unwrap();
            let back: Statut = serde_json::from_str(&json).unwrap();
            assert_eq!(back, statut);
        }
    }
}
