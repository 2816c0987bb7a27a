//! Timer mode: run a sync cycle every interval until shutdown.
//!
//! Cycles never overlap: the next wait starts only after the previous cycle
//! returned. The wait is taken in one-second steps so a shutdown request is
//! honoured within a second even with long intervals.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info};

const STEP: Duration = Duration::from_secs(1);

/// Aggregate results across cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub total_cycles: u64,
    pub total_failures: u64,
    pub consecutive_failures: u64,
}

/// Run `cycle` immediately and then every `interval` until `shutdown` is set.
///
/// `cycle` reports whether the vault was fully synced; a failed cycle is
/// counted and logged and the loop carries on.
pub async fn watch<F, Fut>(interval: Duration, shutdown: &AtomicBool, mut cycle: F) -> WatchStats
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    info!(interval_secs = interval.as_secs(), "watch started");
    let mut stats = WatchStats::default();

    while !shutdown.load(Ordering::SeqCst) {
        stats.total_cycles += 1;
        let n = stats.total_cycles;
        info!(cycle = n, "starting sync cycle");

        if cycle().await {
            stats.consecutive_failures = 0;
            info!(cycle = n, "sync cycle completed");
        } else {
            stats.total_failures += 1;
            stats.consecutive_failures += 1;
            error!(
                cycle = n,
                total_failures = stats.total_failures,
                consecutive_failures = stats.consecutive_failures,
                "sync cycle failed"
            );
        }

        wait(interval, shutdown).await;
    }

    info!(cycles = stats.total_cycles, "watch stopped");
    stats
}

async fn wait(interval: Duration, shutdown: &AtomicBool) {
    let mut remaining = interval;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let step = remaining.min(STEP);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}
