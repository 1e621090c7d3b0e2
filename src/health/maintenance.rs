//! Periodic maintenance: recycle and primary health probe.
//!
//! # Responsibilities
//! - Reap closed or erroring connections from every target
//! - Empty disabled targets
//! - Probe the primary and fail back when it answers
//!
//! # Design Decisions
//! - Errors are recorded the moment they happen; removal waits for the next pass
//! - The probe dial runs outside the manager lock
//! - Probe results never touch the primary's dial bookkeeping

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::failover::manager::{fail_back, ManagerState};
use crate::failover::types::{MaintenanceReport, ProbeOutcome};
use crate::observability::metrics;

/// Run maintenance every `interval` until shutdown is signalled.
pub(crate) async fn run(
    state: Arc<ManagerState>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::debug!(interval_ms = interval.as_millis() as u64, "Maintenance task starting");

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(&state).await;
            }
            _ = shutdown.recv() => {
                tracing::debug!("Maintenance task received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// One pass: recycle, then probe the primary.
pub(crate) async fn run_once(state: &ManagerState) -> MaintenanceReport {
    let recycled = recycle(state);
    let probe = probe_primary(state).await;
    MaintenanceReport { recycled, probe }
}

fn recycle(state: &ManagerState) -> usize {
    let mut targets = state.targets.lock();
    let mut total = 0;

    for target in targets.iter_mut() {
        let removed = target.recycle();
        if removed > 0 {
            tracing::debug!(
                addr = %target.address(),
                removed,
                remaining = target.connection_count(),
                "Recycled connections"
            );
        }
        metrics::record_recycled(target.address(), removed);
        metrics::record_target_connections(target.address(), target.connection_count());
        total += removed;
    }
    total
}

async fn probe_primary(state: &ManagerState) -> ProbeOutcome {
    let address = {
        let targets = state.targets.lock();
        match targets.first() {
            Some(primary) if !primary.is_disabled() => primary.address().to_string(),
            _ => return ProbeOutcome::Skipped,
        }
    };

    let probe = time::timeout(state.dial_timeout, state.dialer.dial(state.network, &address)).await;
    let mut stream = match probe {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            tracing::trace!(addr = %address, error = %e, "Primary probe failed");
            metrics::record_primary_health(false);
            return ProbeOutcome::Unreachable { error: e.to_string() };
        }
        Err(_) => {
            tracing::trace!(addr = %address, "Primary probe timed out");
            metrics::record_primary_health(false);
            return ProbeOutcome::Unreachable {
                error: format!("probe timed out after {:?}", state.dial_timeout),
            };
        }
    };

    let _ = stream.shutdown().await;
    drop(stream);
    metrics::record_primary_health(true);
    tracing::trace!(addr = %address, "Primary probe succeeded");

    let failback_closed = if state.failback_enabled() {
        fail_back(&mut state.targets.lock(), "probe")
    } else {
        0
    };
    ProbeOutcome::Healthy { failback_closed }
}
