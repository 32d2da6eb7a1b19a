//! Scheduled escalation sweep
//!
//! One tokio task drives periodic [`EscalationSweeper::run_sweep`] calls.
//! The sweeper's own guard keeps the loop and the on-demand endpoint from
//! running at once; a skipped tick is logged, not retried, since the next
//! interval covers the same open set anyway.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use domain_dispatch::{DispatchError, EscalationSweeper};

/// Runs sweeps every `interval_secs` until the shutdown signal flips
///
/// An interval of 0 disables the loop; the on-demand endpoint stays
/// available either way.
pub async fn run_sweep_loop(
    sweeper: Arc<EscalationSweeper>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    if interval_secs == 0 {
        info!("escalation sweep loop disabled");
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick resolves immediately; consume it so startup does not
    // double as a sweep.
    interval.tick().await;

    info!(interval_secs, "escalation sweep loop started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweeper.run_sweep().await {
                    Ok(report) => info!(
                        sweep_id = %report.sweep_id,
                        scanned = report.scanned,
                        escalated = report.escalated,
                        warned = report.warned,
                        skipped = report.skipped,
                        failed = report.failed,
                        "scheduled sweep finished"
                    ),
                    Err(DispatchError::SweepInProgress) => {
                        warn!("scheduled sweep skipped: another run holds the guard");
                    }
                    Err(err) => error!(error = %err, "scheduled sweep failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("escalation sweep loop stopping");
                return;
            }
        }
    }
}
