//! Escalation rules and the periodic sweep
//!
//! The sweep walks every open bordereau in keyset pages, judges each one
//! against the duration engine and the configured rules, and pushes the
//! stragglers into `EN_DIFFICULTE` through the same guarded transition
//! path a user would take. Replaying a sweep over an unchanged set is a
//! no-op: files already in `EN_DIFFICULTE` are skipped, so no duplicate
//! transitions or history records can appear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{Actor, Clock, RuleId, SlaStatus, SweepId};
use domain_bordereau::bordereau::{Bordereau, TransitionCommand};
use domain_bordereau::events::{Audience, Notification, NotificationKind};
use domain_bordereau::ports::{BordereauStore, NotificationPort};
use domain_bordereau::statut::Statut;

use crate::error::DispatchError;

/// Open bordereaux examined per store round trip
pub const DEFAULT_SWEEP_BATCH: i64 = 100;

/// When a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCondition {
    /// Deadline passed by at least `min_days`
    DaysOverdue { min_days: i64 },
    /// No movement for `min_days` while sitting in `statut`
    StuckInStatus { statut: Statut, min_days: i64 },
    /// Deadline within `within_days`; warns without a state change
    ApproachingDeadline { within_days: i64 },
}

/// One configured escalation trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: RuleId,
    pub name: String,
    pub condition: RuleCondition,
    pub active: bool,
}

/// What a matched rule asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    /// Push the file into `EN_DIFFICULTE` with this reason
    Escalate { reason: String },
    /// Emit an `SLA_WARNING` notification, touch nothing
    Warn { message: String },
}

impl EscalationRule {
    pub fn new(name: impl Into<String>, condition: RuleCondition) -> Self {
        Self {
            id: RuleId::new_v7(),
            name: name.into(),
            condition,
            active: true,
        }
    }

    /// The stock rule set applied when configuration names none
    pub fn defaults() -> Vec<EscalationRule> {
        vec![
            EscalationRule::new(
                "dossier immobile en cours",
                RuleCondition::StuckInStatus {
                    statut: Statut::EnCours,
                    min_days: 14,
                },
            ),
            EscalationRule::new(
                "instance prolongee",
                RuleCondition::StuckInStatus {
                    statut: Statut::MisEnInstance,
                    min_days: 30,
                },
            ),
            EscalationRule::new(
                "echeance proche",
                RuleCondition::ApproachingDeadline { within_days: 3 },
            ),
        ]
    }

    /// Judges one file against this rule
    pub fn evaluate(&self, bordereau: &Bordereau, now: DateTime<Utc>) -> Option<RuleVerdict> {
        if !self.active {
            return None;
        }
        match self.condition {
            RuleCondition::DaysOverdue { min_days } => {
                let report = bordereau.sla_processing(now);
                if report.settled {
                    return None;
                }
                let overdue_by = -report.remaining_days;
                if overdue_by > 0 && overdue_by >= min_days {
                    Some(RuleVerdict::Escalate {
                        reason: format!("en retard de {overdue_by} jours"),
                    })
                } else {
                    None
                }
            }
            RuleCondition::StuckInStatus { statut, min_days } => {
                // Every write bumps updated_at, so it doubles as the last
                // movement marker.
                let idle_days = (now - bordereau.updated_at).num_days();
                if bordereau.statut == statut && idle_days >= min_days {
                    Some(RuleVerdict::Escalate {
                        reason: format!("sans mouvement en {statut} depuis {idle_days} jours"),
                    })
                } else {
                    None
                }
            }
            RuleCondition::ApproachingDeadline { within_days } => {
                let report = bordereau.sla_processing(now);
                if !report.settled
                    && report.remaining_days >= 0
                    && report.remaining_days <= within_days
                {
                    Some(RuleVerdict::Warn {
                        message: format!("echeance dans {} jours", report.remaining_days),
                    })
                } else {
                    None
                }
            }
        }
    }
}

/// Counters of one sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Open files examined
    pub scanned: u64,
    /// Files pushed into `EN_DIFFICULTE`
    pub escalated: u64,
    /// Warning notifications emitted without a state change
    pub warned: u64,
    /// Files already in `EN_DIFFICULTE`, left alone
    pub skipped: u64,
    /// Files whose escalation write lost a race or failed
    pub failed: u64,
}

/// Walks open bordereaux and escalates the stragglers
///
/// One instance lives in the server; the interval loop and the on-demand
/// admin endpoint both call [`run_sweep`](Self::run_sweep). An atomic
/// guard keeps runs from overlapping; a crashed run is simply re-run and
/// idempotence does the rest.
pub struct EscalationSweeper {
    store: Arc<dyn BordereauStore>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
    rules: Vec<EscalationRule>,
    batch_size: i64,
    running: AtomicBool,
}

impl EscalationSweeper {
    pub fn new(
        store: Arc<dyn BordereauStore>,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
        rules: Vec<EscalationRule>,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            rules,
            batch_size: batch_size.max(1),
            running: AtomicBool::new(false),
        }
    }

    /// One full pass over the open set
    ///
    /// Returns `SweepInProgress` when another run holds the guard. Entity
    /// failures (a version conflict with a concurrent user action, a write
    /// outage on one row) are counted and passed over, never fatal.
    pub async fn run_sweep(&self) -> Result<SweepReport, DispatchError> {
        let _guard = SweepGuard::acquire(&self.running)?;

        let sweep_id = SweepId::new_v7();
        let started_at = self.clock.now();
        let mut report = SweepReport {
            sweep_id,
            started_at,
            finished_at: started_at,
            scanned: 0,
            escalated: 0,
            warned: 0,
            skipped: 0,
            failed: 0,
        };
        info!(sweep_id = %sweep_id, "escalation sweep started");

        let mut after = None;
        loop {
            let batch = self.store.page_open(after, self.batch_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id);
            for bordereau in batch {
                report.scanned += 1;
                self.inspect(bordereau, sweep_id, &mut report).await;
            }
        }

        report.finished_at = self.clock.now();
        info!(
            sweep_id = %sweep_id,
            scanned = report.scanned,
            escalated = report.escalated,
            warned = report.warned,
            skipped = report.skipped,
            failed = report.failed,
            "escalation sweep finished"
        );
        Ok(report)
    }

    async fn inspect(&self, bordereau: Bordereau, sweep_id: SweepId, report: &mut SweepReport) {
        let now = self.clock.now();
        if bordereau.statut == Statut::EnDifficulte {
            report.skipped += 1;
            return;
        }

        let sla = bordereau.sla_processing(now);
        let mut escalate_reason = if sla.status == SlaStatus::Overdue {
            Some(format!("en retard de {} jours", -sla.remaining_days))
        } else {
            None
        };
        let mut warnings = Vec::new();
        for rule in &self.rules {
            match rule.evaluate(&bordereau, now) {
                Some(RuleVerdict::Escalate { reason }) => {
                    escalate_reason.get_or_insert(reason);
                }
                Some(RuleVerdict::Warn { message }) => warnings.push(message),
                None => {}
            }
        }

        if let Some(reason) = escalate_reason {
            self.escalate(bordereau, reason, sweep_id, report).await;
            return;
        }
        for message in warnings {
            let audience = match bordereau.team_id {
                Some(team_id) => Audience::Team { team_id },
                None => Audience::Role {
                    role: core_kernel::Role::ChefEquipe,
                },
            };
            let notification = Notification::new(
                NotificationKind::SlaWarning,
                bordereau.id,
                audience,
                message,
                now,
            )
            .with_actor(Actor::system().user_id)
            .with_sweep(sweep_id);
            if let Err(err) = self.notifier.publish(notification).await {
                warn!(error = %err, bordereau_id = %bordereau.id, "sla warning publish failed");
            }
            report.warned += 1;
        }
    }

    async fn escalate(
        &self,
        bordereau: Bordereau,
        reason: String,
        sweep_id: SweepId,
        report: &mut SweepReport,
    ) {
        let cmd = TransitionCommand::new(Statut::EnDifficulte, Actor::system(), self.clock.now())
            .with_reason(reason)
            .from_sweep(sweep_id);
        let outcome = match bordereau.transition(cmd) {
            Ok(outcome) => outcome,
            Err(err) => {
                report.failed += 1;
                warn!(error = %err, bordereau_id = %bordereau.id, "sweep cannot escalate");
                return;
            }
        };
        match self
            .store
            .update_guarded(&outcome.bordereau, bordereau.version, &outcome.history)
            .await
        {
            Ok(_) => {
                report.escalated += 1;
                for notification in outcome.notifications {
                    if let Err(err) = self.notifier.publish(notification).await {
                        warn!(error = %err, bordereau_id = %bordereau.id, "escalation publish failed");
                    }
                }
            }
            Err(err) => {
                report.failed += 1;
                warn!(error = %err, bordereau_id = %bordereau.id, "sweep escalation write failed");
            }
        }
    }
}

/// Resets the running flag even when a sweep panics or bails early
struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, DispatchError> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::SweepInProgress);
        }
        Ok(Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
