//! Workflow notifications
//!
//! Successful mutations emit events describing who should hear about them.
//! Delivery (mail, websocket, digest) lives behind [`crate::ports::NotificationPort`];
//! the engine only decides the audience and the kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BordereauId, NotificationId, Role, SweepId, TeamId, UserId};

use crate::statut::Statut;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A new bordereau is waiting in the scan queue
    ReadyToScan,
    /// A scanned bordereau is waiting in a chef's corbeille
    ReadyToAssign,
    /// A handler received new work
    Assigned,
    /// Processing finished; finance can pick the file up
    ReadyForPayment,
    /// A handler returned the file to the chef
    Returned,
    /// The file was rejected
    Rejected,
    /// The file was parked by its handler
    OnHold,
    /// The sweep (or a rule) flagged the file
    Escalated,
    /// Deadline inside the warning band
    SlaWarning,
    /// Deadline passed
    SlaBreach,
    /// Every handler of a team is at or over the ceiling
    TeamOverload,
    /// No sibling team could absorb an overflow
    EscalationRequired,
}

impl NotificationKind {
    /// Wire name, matching the stored and transmitted form
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ReadyToScan => "READY_TO_SCAN",
            NotificationKind::ReadyToAssign => "READY_TO_ASSIGN",
            NotificationKind::Assigned => "ASSIGNED",
            NotificationKind::ReadyForPayment => "READY_FOR_PAYMENT",
            NotificationKind::Returned => "RETURNED",
            NotificationKind::Rejected => "REJECTED",
            NotificationKind::OnHold => "ON_HOLD",
            NotificationKind::Escalated => "ESCALATED",
            NotificationKind::SlaWarning => "SLA_WARNING",
            NotificationKind::SlaBreach => "SLA_BREACH",
            NotificationKind::TeamOverload => "TEAM_OVERLOAD",
            NotificationKind::EscalationRequired => "ESCALATION_REQUIRED",
        }
    }
}

/// Who should hear about it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Audience {
    User { user_id: UserId },
    Team { team_id: TeamId },
    Role { role: Role },
}

/// One event handed to the notification port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub bordereau_id: BordereauId,
    pub audience: Audience,
    pub message: String,
    /// Who caused the event; the sweep stamps the system actor
    pub actor_id: Option<UserId>,
    /// Set when a sweep run produced the event (dedup key)
    pub sweep_id: Option<SweepId>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        bordereau_id: BordereauId,
        audience: Audience,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new_v7(),
            kind,
            bordereau_id,
            audience,
            message: message.into(),
            actor_id: None,
            sweep_id: None,
            created_at,
        }
    }

    pub fn with_actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_sweep(mut self, sweep_id: SweepId) -> Self {
        self.sweep_id = Some(sweep_id);
        self
    }
}

/// Events a status entry raises, derived from the target state
///
/// Mirrors the routing the back office expects: the scan queue is watched
/// by the scan team, chef corbeilles by their chef, payment by finance.
pub fn on_status_entered(
    bordereau_id: BordereauId,
    reference: &str,
    target: Statut,
    team_id: Option<TeamId>,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let team_audience = |fallback: Role| match team_id {
        Some(team_id) => Audience::Team { team_id },
        None => Audience::Role { role: fallback },
    };

    match target {
        Statut::AScanner => vec![Notification::new(
            NotificationKind::ReadyToScan,
            bordereau_id,
            Audience::Role {
                role: Role::ScanTeam,
            },
            format!("Bordereau {reference} pret a scanner"),
            now,
        )],
        Statut::AAffecter | Statut::Scanne => vec![Notification::new(
            NotificationKind::ReadyToAssign,
            bordereau_id,
            team_audience(Role::ChefEquipe),
            format!("Bordereau {reference} a affecter"),
            now,
        )],
        Statut::Traite => vec![Notification::new(
            NotificationKind::ReadyForPayment,
            bordereau_id,
            Audience::Role {
                role: Role::Finance,
            },
            format!("Bordereau {reference} traite, virement a preparer"),
            now,
        )],
        Statut::EnDifficulte => vec![Notification::new(
            NotificationKind::Returned,
            bordereau_id,
            team_audience(Role::ChefEquipe),
            format!("Bordereau {reference} signale en difficulte"),
            now,
        )],
        Statut::Rejete => vec![Notification::new(
            NotificationKind::Rejected,
            bordereau_id,
            team_audience(Role::ChefEquipe),
            format!("Bordereau {reference} rejete"),
            now,
        )],
        Statut::MisEnInstance => vec![Notification::new(
            NotificationKind::OnHold,
            bordereau_id,
            team_audience(Role::ChefEquipe),
            format!("Bordereau {reference} mis en instance"),
            now,
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_queue_entry_notifies_scan_team() {
        let events = on_status_entered(BordereauId::new(), "BDX-2025-001", Statut::AScanner, None, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, NotificationKind::ReadyToScan);
        assert_eq!(
            events[0].audience,
            Audience::Role {
                role: Role::ScanTeam
            }
        );
        // The transition stamps the actor; entry routing leaves it unset.
        assert_eq!(events[0].actor_id, None);
    }

    #[test]
    fn test_team_states_prefer_the_team_audience() {
        let team = TeamId::new();
        let events = on_status_entered(
            BordereauId::new(),
            "BDX-2025-002",
            Statut::AAffecter,
            Some(team),
            Utc::now(),
        );
        assert_eq!(events[0].audience, Audience::Team { team_id: team });
    }

    #[test]
    fn test_silent_states_emit_nothing() {
        for statut in [Statut::EnCours, Statut::Cloture, Statut::VirementEnCours] {
            let events = on_status_entered(BordereauId::new(), "x", statut, None, Utc::now());
            assert!(events.is_empty(), "{statut} should be silent");
        }
    }
}
