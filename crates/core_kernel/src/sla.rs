//! SLA duration engine
//!
//! Pure calendar-day arithmetic over the lifecycle timestamps of a work
//! item. Nothing here is persisted as authoritative: callers re-evaluate
//! from the stored timestamps on every read, passing `now` explicitly so
//! the same snapshot always yields the same verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deadline applied when neither the bordereau nor the client carries one
pub const DEFAULT_SLA_DAYS: i64 = 30;

/// Width of the warning band before the deadline, in days
pub const WARNING_BAND_DAYS: i64 = 3;

/// Traffic-light verdict against a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaStatus {
    /// Comfortably inside the deadline (or finished within it)
    OnTime,
    /// Still open with at most [`WARNING_BAND_DAYS`] of margin left
    AtRisk,
    /// Deadline passed (or finished after it)
    Overdue,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::OnTime => "ON_TIME",
            SlaStatus::AtRisk => "AT_RISK",
            SlaStatus::Overdue => "OVERDUE",
        }
    }
}

/// Result of evaluating one clock of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaReport {
    /// Whole days consumed so far (or in total, once the clock closed)
    pub elapsed_days: i64,
    /// Days of margin left; negative once the deadline has passed
    pub remaining_days: i64,
    pub status: SlaStatus,
    /// False while the closing timestamp is still missing
    pub settled: bool,
}

/// Evaluates one clock: opened at `opened_at`, closed at `closed_at` if the
/// closing event already happened.
///
/// An absent closing timestamp means the clock is still running and `now`
/// stands in for it; it is never treated as "zero elapsed". A running clock
/// gets the three-band verdict; a closed one is judged met-or-missed, so a
/// file that finished with two days of margin is `ON_TIME` even though the
/// same margin on a running clock would read `AT_RISK`.
pub fn evaluate(
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    sla_days: i64,
    now: DateTime<Utc>,
) -> SlaReport {
    let end = closed_at.unwrap_or(now);
    let elapsed_days = whole_days_between(opened_at, end);
    let remaining_days = sla_days - elapsed_days;

    let status = match closed_at {
        Some(_) => {
            if remaining_days >= 0 {
                SlaStatus::OnTime
            } else {
                SlaStatus::Overdue
            }
        }
        None => {
            if remaining_days < 0 {
                SlaStatus::Overdue
            } else if remaining_days <= WARNING_BAND_DAYS {
                SlaStatus::AtRisk
            } else {
                SlaStatus::OnTime
            }
        }
    };

    SlaReport {
        elapsed_days,
        remaining_days,
        status,
        settled: closed_at.is_some(),
    }
}

/// Whole days between two instants, truncated toward zero
///
/// A file received this morning has zero elapsed days all day, matching how
/// the back office counts deadlines ("J+30" style).
pub fn whole_days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_days()
}

/// Duration of a sub-interval (scan, total processing) when both of its
/// bounds exist
pub fn interval_days(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (start, end) {
        (Some(s), Some(e)) => Some(whole_days_between(s, e)),
        _ => None,
    }
}
