//! Custom Test Assertions
//!
//! Specialized assertion helpers for domain types that give more
//! meaningful error messages than standard assertions.

use core_kernel::sla::{SlaReport, SlaStatus};
use core_kernel::UserId;
use domain_bordereau::bordereau::Bordereau;
use domain_bordereau::events::{Notification, NotificationKind};
use domain_bordereau::history::{HistoryAction, TraitementHistory};
use domain_bordereau::statut::Statut;

/// Asserts that a bordereau sits in the expected statut
///
/// # Panics
///
/// Panics with both statuts spelled out when they differ
pub fn assert_statut(bordereau: &Bordereau, expected: Statut) {
    assert_eq!(
        bordereau.statut, expected,
        "Bordereau {} is in {}, expected {}",
        bordereau.reference, bordereau.statut, expected
    );
}

/// Asserts that a bordereau is `ASSIGNE` to the given handler, with a
/// consistent ownership pair
pub fn assert_assigned_to(bordereau: &Bordereau, user: UserId) {
    assert_statut(bordereau, Statut::Assigne);
    assert_eq!(
        bordereau.ownership.assigned_to(),
        Some(user),
        "Bordereau {} assigned to {:?}, expected {}",
        bordereau.reference,
        bordereau.ownership.assigned_to(),
        user
    );
    assert_ownership_consistent(bordereau);
}

/// Asserts that the ownership pair matches what the statut requires
pub fn assert_ownership_consistent(bordereau: &Bordereau) {
    assert!(
        bordereau.ownership.is_consistent_with(bordereau.statut),
        "Bordereau {} in {} carries an inconsistent ownership pair: {:?}",
        bordereau.reference,
        bordereau.statut,
        bordereau.ownership
    );
}

/// Asserts that exactly `expected` records with the given action exist
pub fn assert_action_count(
    history: &[TraitementHistory],
    action: HistoryAction,
    expected: usize,
) {
    let actual = history.iter().filter(|h| h.action == action).count();
    assert_eq!(
        actual,
        expected,
        "Expected {} {} record(s), found {} in {:?}",
        expected,
        action.as_str(),
        actual,
        history.iter().map(|h| h.action).collect::<Vec<_>>()
    );
}

/// Asserts that at least one notification of the given kind was published
pub fn assert_notified(notifications: &[Notification], kind: NotificationKind) {
    assert!(
        notifications.iter().any(|n| n.kind == kind),
        "Expected a {:?} notification, got {:?}",
        kind,
        notifications.iter().map(|n| n.kind).collect::<Vec<_>>()
    );
}

/// Asserts that no notification of the given kind was published
pub fn assert_not_notified(notifications: &[Notification], kind: NotificationKind) {
    assert!(
        notifications.iter().all(|n| n.kind != kind),
        "Expected no {:?} notification, got {:?}",
        kind,
        notifications.iter().map(|n| n.kind).collect::<Vec<_>>()
    );
}

/// Asserts the verdict of one SLA clock
pub fn assert_sla_status(report: &SlaReport, expected: SlaStatus) {
    assert_eq!(
        report.status, expected,
        "SLA verdict is {} (elapsed {}d, remaining {}d), expected {}",
        report.status.as_str(),
        report.elapsed_days,
        report.remaining_days,
        expected.as_str()
    );
}
