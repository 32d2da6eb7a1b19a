//! Assignment policies
//!
//! Pure selection over a pool of handlers with known loads. The service
//! layer owns the I/O (pool query, load counts, the guarded write); this
//! module only answers "who takes the next file". Determinism matters:
//! the same pool and cursor always produce the same pick, so concurrent
//! routers disagree only through the guarded write, never through
//! selection noise.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use core_kernel::UserId;

use crate::error::DispatchError;
use crate::workload::HandlerLoad;

/// How the router picks a handler inside a team
///
/// The same three kinds apply at team granularity when overflow reroutes
/// toward a sibling team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentPolicy {
    /// Handler with the fewest active files
    #[default]
    LowestLoad,
    /// Next handler after the persisted per-team cursor
    RoundRobin,
    /// Handler with the most remaining personal headroom
    CapacityBased,
}

impl AssignmentPolicy {
    pub const ALL: [AssignmentPolicy; 3] = [
        AssignmentPolicy::LowestLoad,
        AssignmentPolicy::RoundRobin,
        AssignmentPolicy::CapacityBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPolicy::LowestLoad => "LOWEST_LOAD",
            AssignmentPolicy::RoundRobin => "ROUND_ROBIN",
            AssignmentPolicy::CapacityBased => "CAPACITY_BASED",
        }
    }
}

impl fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentPolicy {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOWEST_LOAD" => Ok(AssignmentPolicy::LowestLoad),
            "ROUND_ROBIN" => Ok(AssignmentPolicy::RoundRobin),
            "CAPACITY_BASED" => Ok(AssignmentPolicy::CapacityBased),
            other => Err(DispatchError::validation(format!(
                "unknown assignment policy: {other}"
            ))),
        }
    }
}

/// Picks a handler from the pool, or `None` when everyone sits at or over
/// `max_load`
///
/// The stable order is earliest-created handler first, id as tiebreak;
/// every policy breaks its ties through it. `ROUND_ROBIN` walks that order
/// from the position after `cursor` (start of the ring when the cursor is
/// unset or has left the pool), skipping saturated handlers.
pub fn select_handler<'a>(
    policy: AssignmentPolicy,
    pool: &'a [HandlerLoad],
    max_load: i32,
    cursor: Option<UserId>,
) -> Option<&'a HandlerLoad> {
    let ceiling = i64::from(max_load);
    let mut ordered: Vec<&HandlerLoad> = pool.iter().collect();
    ordered.sort_by(|a, b| {
        a.user
            .created_at
            .cmp(&b.user.created_at)
            .then(a.user.id.cmp(&b.user.id))
    });

    match policy {
        AssignmentPolicy::LowestLoad => ordered
            .into_iter()
            .filter(|h| h.load < ceiling)
            .min_by_key(|h| h.load),
        AssignmentPolicy::CapacityBased => ordered
            .into_iter()
            .filter(|h| h.load < ceiling)
            .min_by_key(|h| Reverse(h.headroom())),
        AssignmentPolicy::RoundRobin => {
            let start = cursor
                .and_then(|c| ordered.iter().position(|h| h.user.id == c))
                .map(|pos| pos + 1)
                .unwrap_or(0);
            (0..ordered.len())
                .map(|offset| ordered[(start + offset) % ordered.len()])
                .find(|h| h.load < ceiling)
        }
    }
}
