//! Periodic expiry sweeps.
//!
//! Optional: by default sweeps only run when a query arrives. An interval
//! keeps the registry bounded when nobody queries for a long time.

use crate::shutdown::Shutdown;
use presence_core::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Sweep `registry` every `interval` until shutdown. Returns the total number
/// of records removed.
pub async fn run_periodic(
    registry: Arc<Registry>,
    threshold: Duration,
    interval: Duration,
    mut shutdown: Shutdown,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let mut total_removed = 0;
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                let removed = registry.sweep(threshold);
                total_removed += removed;
                if removed > 0 {
                    debug!("Periodic sweep removed {} participant(s)", removed);
                }
            }
        }
    }

    debug!("Periodic sweeper stopped after removing {} participant(s)", total_removed);
    total_removed
}
