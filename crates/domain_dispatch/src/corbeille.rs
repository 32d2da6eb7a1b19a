//! Corbeille projection
//!
//! A corbeille is a role-shaped view over the same bordereau set: three
//! buckets (ready, in progress, recently completed) plus counters. The
//! projection is a pure function of a snapshot and a clock; the service
//! layer fetches the snapshot (one store query per bucket family, one
//! directory query for team membership) and hands it over. Archived files
//! never reach the snapshot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::sla::SlaReport;
use core_kernel::{Actor, Role, SlaStatus, UserId};
use domain_bordereau::bordereau::{compute_priorite, Bordereau, Priorite};
use domain_bordereau::statut::Statut;

/// Trailing window of the completed bucket, in days
pub const COMPLETED_WINDOW_DAYS: i64 = 7;

/// The completed bucket never grows past this many items
pub const COMPLETED_CAP: usize = 50;

/// Where one file lands in a corbeille
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Ready,
    InProgress,
    Completed,
}

/// One file in a corbeille, carrying its freshly computed annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorbeilleItem {
    pub bordereau: Bordereau,
    /// Processing clock at resolution time
    pub sla: SlaReport,
    /// Live urgency; may differ from the stored intake estimate
    pub priorite: Priorite,
    /// Actual linked slips, not the declared `nombre_bs`
    pub document_count: i64,
}

/// Bucket sizes plus deadline pressure over the open work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorbeilleStats {
    pub ready: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Open items past their deadline
    pub overdue: usize,
    /// Open items inside the warning band
    pub at_risk: usize,
}

/// The resolved work queue of one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corbeille {
    pub ready: Vec<CorbeilleItem>,
    pub in_progress: Vec<CorbeilleItem>,
    pub completed: Vec<CorbeilleItem>,
    pub stats: CorbeilleStats,
}

/// Statuts a role's open buckets draw from; the store fetch is bounded to
/// these
pub fn open_statuts(role: Role) -> &'static [Statut] {
    match role {
        Role::Bo => &[Statut::EnAttente],
        Role::ScanTeam => &[Statut::AScanner, Statut::ScanEnCours],
        Role::Gestionnaire | Role::GestionnaireSenior => {
            &[Statut::Assigne, Statut::EnCours, Statut::MisEnInstance]
        }
        Role::ChefEquipe => &[
            Statut::Scanne,
            Statut::AAffecter,
            Statut::EnDifficulte,
            Statut::Rejete,
            Statut::Assigne,
            Statut::EnCours,
            Statut::MisEnInstance,
        ],
        Role::Finance => &[
            Statut::Traite,
            Statut::PretVirement,
            Statut::VirementEnCours,
            Statut::VirementRejete,
        ],
        Role::SuperAdmin => &[
            Statut::EnAttente,
            Statut::AScanner,
            Statut::ScanEnCours,
            Statut::Scanne,
            Statut::AAffecter,
            Statut::Assigne,
            Statut::EnCours,
            Statut::MisEnInstance,
            Statut::EnDifficulte,
            Statut::Rejete,
            Statut::PretVirement,
            Statut::VirementEnCours,
            Statut::VirementRejete,
        ],
    }
}

/// Statuts a role's completed bucket draws from, windowed by last update
pub fn completed_statuts(role: Role) -> &'static [Statut] {
    match role {
        Role::Bo => &[Statut::Cloture],
        Role::ScanTeam => &[Statut::Scanne],
        Role::Gestionnaire | Role::GestionnaireSenior => &[Statut::Traite, Statut::Cloture],
        Role::ChefEquipe => &[Statut::Traite, Statut::VirementExecute, Statut::Cloture],
        Role::Finance | Role::SuperAdmin => {
            &[Statut::Traite, Statut::VirementExecute, Statut::Cloture]
        }
    }
}

/// Routes one file into the actor's corbeille, or drops it
///
/// `team_members` is the resolved membership of the chef's team (one
/// directory query, reused for every row); empty for roles without one.
pub fn bucket_for(actor: &Actor, team_members: &[UserId], b: &Bordereau) -> Option<Bucket> {
    if b.archived {
        return None;
    }
    let me = actor.user_id;
    match actor.role {
        Role::Bo => match b.statut {
            Statut::EnAttente => Some(Bucket::Ready),
            Statut::Cloture => Some(Bucket::Completed),
            _ => None,
        },
        Role::ScanTeam => match b.statut {
            Statut::AScanner => Some(Bucket::Ready),
            Statut::ScanEnCours => Some(Bucket::InProgress),
            Statut::Scanne => Some(Bucket::Completed),
            _ => None,
        },
        Role::Gestionnaire | Role::GestionnaireSenior => match b.statut {
            Statut::Assigne if b.ownership.assigned_to() == Some(me) => Some(Bucket::Ready),
            Statut::EnCours | Statut::MisEnInstance
                if b.ownership.active_handler(b.statut) == Some(me) =>
            {
                Some(Bucket::InProgress)
            }
            Statut::Traite | Statut::Cloture if b.ownership.assigned_to() == Some(me) => {
                Some(Bucket::Completed)
            }
            _ => None,
        },
        Role::ChefEquipe => {
            let my_team = actor.led_team();
            // Unrouted files are visible to every chef until one takes them.
            let in_custody = b.team_id.is_none() || b.team_id == my_team;
            let handled = |user: Option<UserId>| {
                user.map_or(false, |u| u == me || team_members.contains(&u))
            };
            match b.statut {
                Statut::Scanne | Statut::AAffecter | Statut::Rejete if in_custody => {
                    Some(Bucket::Ready)
                }
                Statut::EnDifficulte
                    if in_custody || handled(b.ownership.current_handler()) =>
                {
                    Some(Bucket::Ready)
                }
                Statut::Assigne | Statut::EnCours | Statut::MisEnInstance
                    if handled(b.ownership.assigned_to()) =>
                {
                    Some(Bucket::InProgress)
                }
                Statut::Traite | Statut::VirementExecute | Statut::Cloture
                    if handled(b.ownership.assigned_to()) =>
                {
                    Some(Bucket::Completed)
                }
                _ => None,
            }
        }
        Role::Finance => match b.statut {
            Statut::Traite | Statut::PretVirement => Some(Bucket::Ready),
            Statut::VirementEnCours | Statut::VirementRejete => Some(Bucket::InProgress),
            Statut::VirementExecute | Statut::Cloture => Some(Bucket::Completed),
            _ => None,
        },
        Role::SuperAdmin => match b.statut {
            Statut::EnAttente
            | Statut::AScanner
            | Statut::Scanne
            | Statut::AAffecter
            | Statut::EnDifficulte
            | Statut::Rejete => Some(Bucket::Ready),
            Statut::ScanEnCours
            | Statut::Assigne
            | Statut::EnCours
            | Statut::MisEnInstance
            | Statut::PretVirement
            | Statut::VirementEnCours
            | Statut::VirementRejete => Some(Bucket::InProgress),
            Statut::Traite | Statut::VirementExecute | Statut::Cloture => Some(Bucket::Completed),
        },
    }
}

/// Builds the corbeille from one snapshot
///
/// Deterministic: the same rows, membership and clock always produce the
/// same buckets. Open buckets are ordered oldest intake first (id as
/// tiebreak); completed is last-touched first, windowed to `window_days`
/// and capped at [`COMPLETED_CAP`].
pub fn build(
    actor: &Actor,
    team_members: &[UserId],
    rows: Vec<(Bordereau, i64)>,
    window_days: i64,
    now: DateTime<Utc>,
) -> Corbeille {
    let mut ready = Vec::new();
    let mut in_progress = Vec::new();
    let mut completed = Vec::new();
    let window_start = now - Duration::days(window_days);

    for (bordereau, document_count) in rows {
        let Some(bucket) = bucket_for(actor, team_members, &bordereau) else {
            continue;
        };
        if bucket == Bucket::Completed && bordereau.updated_at < window_start {
            continue;
        }
        let sla = bordereau.sla_processing(now);
        let item = CorbeilleItem {
            priorite: compute_priorite(&sla, document_count),
            sla,
            document_count,
            bordereau,
        };
        match bucket {
            Bucket::Ready => ready.push(item),
            Bucket::InProgress => in_progress.push(item),
            Bucket::Completed => completed.push(item),
        }
    }

    let oldest_first = |a: &CorbeilleItem, b: &CorbeilleItem| {
        a.bordereau
            .date_reception
            .cmp(&b.bordereau.date_reception)
            .then(a.bordereau.id.cmp(&b.bordereau.id))
    };
    ready.sort_by(oldest_first);
    in_progress.sort_by(oldest_first);
    completed.sort_by(|a, b| {
        b.bordereau
            .updated_at
            .cmp(&a.bordereau.updated_at)
            .then(a.bordereau.id.cmp(&b.bordereau.id))
    });
    completed.truncate(COMPLETED_CAP);

    let open = ready.iter().chain(in_progress.iter());
    let stats = CorbeilleStats {
        ready: ready.len(),
        in_progress: in_progress.len(),
        completed: completed.len(),
        overdue: open
            .clone()
            .filter(|i| i.sla.status == SlaStatus::Overdue)
            .count(),
        at_risk: open.filter(|i| i.sla.status == SlaStatus::AtRisk).count(),
    };

    Corbeille {
        ready,
        in_progress,
        completed,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{ClientId, TeamId};
    use domain_bordereau::ownership::Ownership;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0).unwrap()
    }

    fn file(statut: Statut, received_days_ago: i64) -> Bordereau {
        let received = now() - Duration::days(received_days_ago);
        let mut b = Bordereau::receive(
            format!("BDX-{}-{received_days_ago}", statut.as_str()),
            ClientId::new(),
            10,
            Some(30),
            None,
            received,
        )
        .unwrap();
        b.statut = statut;
        b.updated_at = now() - Duration::hours(1);
        b
    }

    #[test]
    fn test_bo_sees_intake_queue() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let rows = vec![
            (file(Statut::EnAttente, 1), 0),
            (file(Statut::AScanner, 1), 0),
            (file(Statut::Cloture, 1), 0),
        ];
        let corbeille = build(&bo, &[], rows, COMPLETED_WINDOW_DAYS, now());
        assert_eq!(corbeille.stats.ready, 1);
        assert_eq!(corbeille.stats.in_progress, 0);
        assert_eq!(corbeille.stats.completed, 1);
    }

    #[test]
    fn test_gestionnaire_sees_only_own_files() {
        let me = UserId::new();
        let gest = Actor::new(me, Role::Gestionnaire);

        let mut mine = file(Statut::Assigne, 2);
        mine.ownership = Ownership::assigned(me);
        let mut working = file(Statut::EnCours, 3);
        working.ownership = Ownership::working(me);
        let mut foreign = file(Statut::Assigne, 1);
        foreign.ownership = Ownership::assigned(UserId::new());

        let corbeille = build(
            &gest,
            &[],
            vec![(mine, 5), (working, 5), (foreign, 5)],
            COMPLETED_WINDOW_DAYS,
            now(),
        );
        assert_eq!(corbeille.stats.ready, 1);
        assert_eq!(corbeille.stats.in_progress, 1);
        assert_eq!(corbeille.ready[0].bordereau.ownership.assigned_to(), Some(me));
    }

    #[test]
    fn test_chef_custody_and_membership() {
        let chef_id = UserId::new();
        let team = TeamId::from_chef(chef_id);
        let chef = Actor::new(chef_id, Role::ChefEquipe);
        let member = UserId::new();

        let mut queued = file(Statut::AAffecter, 4);
        queued.team_id = Some(team);
        let unrouted = file(Statut::Scanne, 2);
        let mut member_file = file(Statut::EnCours, 3);
        member_file.ownership = Ownership::working(member);
        let mut other_team = file(Statut::AAffecter, 1);
        other_team.team_id = Some(TeamId::from_chef(UserId::new()));
        let mut foreign_handler = file(Statut::EnCours, 1);
        foreign_handler.ownership = Ownership::working(UserId::new());

        let corbeille = build(
            &chef,
            &[member],
            vec![
                (queued, 1),
                (unrouted, 1),
                (member_file, 1),
                (other_team, 1),
                (foreign_handler, 1),
            ],
            COMPLETED_WINDOW_DAYS,
            now(),
        );
        // Own queue + unrouted pool, never the sibling team's queue.
        assert_eq!(corbeille.stats.ready, 2);
        assert_eq!(corbeille.stats.in_progress, 1);
    }

    #[test]
    fn test_finance_payment_pipeline() {
        let finance = Actor::new(UserId::new(), Role::Finance);
        let rows = vec![
            (file(Statut::Traite, 5), 0),
            (file(Statut::PretVirement, 4), 0),
            (file(Statut::VirementEnCours, 3), 0),
            (file(Statut::VirementRejete, 2), 0),
            (file(Statut::VirementExecute, 1), 0),
        ];
        let corbeille = build(&finance, &[], rows, COMPLETED_WINDOW_DAYS, now());
        assert_eq!(corbeille.stats.ready, 2);
        assert_eq!(corbeille.stats.in_progress, 2);
        assert_eq!(corbeille.stats.completed, 1);
    }

    #[test]
    fn test_open_buckets_are_oldest_first() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let rows = vec![
            (file(Statut::EnAttente, 1), 0),
            (file(Statut::EnAttente, 9), 0),
            (file(Statut::EnAttente, 4), 0),
        ];
        let corbeille = build(&bo, &[], rows, COMPLETED_WINDOW_DAYS, now());
        let receptions: Vec<_> = corbeille
            .ready
            .iter()
            .map(|i| i.bordereau.date_reception)
            .collect();
        let mut sorted = receptions.clone();
        sorted.sort();
        assert_eq!(receptions, sorted);
    }

    #[test]
    fn test_completed_window_and_cap() {
        let bo = Actor::new(UserId::new(), Role::Bo);

        let mut stale = file(Statut::Cloture, 30);
        stale.updated_at = now() - Duration::days(10);
        let mut rows = vec![(stale, 0)];
        for i in 0..60 {
            let mut done = file(Statut::Cloture, 15);
            done.updated_at = now() - Duration::hours(i);
            rows.push((done, 0));
        }

        let corbeille = build(&bo, &[], rows, COMPLETED_WINDOW_DAYS, now());
        assert_eq!(corbeille.completed.len(), COMPLETED_CAP);
        // Most recently touched first, the 10-day-old closure filtered out.
        assert!(corbeille
            .completed
            .windows(2)
            .all(|w| w[0].bordereau.updated_at >= w[1].bordereau.updated_at));
        assert!(corbeille
            .completed
            .iter()
            .all(|i| i.bordereau.updated_at >= now() - Duration::days(COMPLETED_WINDOW_DAYS)));
    }

    #[test]
    fn test_stats_count_deadline_pressure() {
        let bo = Actor::new(UserId::new(), Role::Bo);

        let overdue = {
            let mut b = file(Statut::EnAttente, 40);
            b.delai_reglement = 30;
            b
        };
        let at_risk = {
            let mut b = file(Statut::EnAttente, 28);
            b.delai_reglement = 30;
            b
        };
        let fresh = file(Statut::EnAttente, 1);

        let corbeille = build(
            &bo,
            &[],
            vec![(overdue, 0), (at_risk, 0), (fresh, 0)],
            COMPLETED_WINDOW_DAYS,
            now(),
        );
        assert_eq!(corbeille.stats.overdue, 1);
        assert_eq!(corbeille.stats.at_risk, 1);
    }

    #[test]
    fn test_archived_files_never_appear() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let mut archived = file(Statut::EnAttente, 2);
        archived.archived = true;

        let corbeille = build(&bo, &[], vec![(archived, 0)], COMPLETED_WINDOW_DAYS, now());
        assert_eq!(corbeille.stats.ready, 0);
    }

    #[test]
    fn test_items_carry_live_priority() {
        let bo = Actor::new(UserId::new(), Role::Bo);
        let big_batch = file(Statut::EnAttente, 1);

        let corbeille = build(&bo, &[], vec![(big_batch, 80)], COMPLETED_WINDOW_DAYS, now());
        assert_eq!(corbeille.ready[0].priorite, Priorite::Haute);
        assert_eq!(corbeille.ready[0].document_count, 80);
    }

    #[test]
    fn test_fetch_sets_cover_every_bucket_source() {
        for role in Role::ALL {
            let open = open_statuts(role);
            let done = completed_statuts(role);
            // The two fetch families never overlap, so no row is read twice.
            assert!(open.iter().all(|s| !done.contains(s)), "{role} overlaps");
        }
    }
}
