//! Failover manager.
//!
//! # Responsibilities
//! - Hold the fixed, priority-ordered target list
//! - Dial targets in order until one answers
//! - Close secondary connections when the primary comes back (failback)
//! - Own the background maintenance task
//!
//! # Design Decisions
//! - One lock guards every target; it is never held across a dial
//! - The caller-supplied address is informational only: the manager always
//!   dials its own targets
//! - Per-target failures are stored on the target, never returned

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::FailoverConfig;
use crate::failover::target::Target;
use crate::failover::types::{
    DialError, MaintenanceReport, ManagerError, ManagerSnapshot, TargetSnapshot,
};
use crate::health::maintenance;
use crate::lifecycle::Shutdown;
use crate::net::{DialerRef, InstrumentedConnection, Network, TcpDialer};
use crate::observability::metrics;

/// State shared between the manager and its maintenance task.
pub(crate) struct ManagerState {
    pub(crate) targets: Mutex<Vec<Target>>,
    pub(crate) dialer: DialerRef,
    pub(crate) dial_timeout: Duration,
    pub(crate) network: Network,
    pub(crate) failback: AtomicBool,
}

impl ManagerState {
    pub(crate) fn failback_enabled(&self) -> bool {
        self.failback.load(Ordering::Relaxed)
    }
}

/// Close every connection on every non-primary target. Targets stay enabled.
pub(crate) fn fail_back(targets: &mut [Target], trigger: &'static str) -> usize {
    let closed: usize = targets.iter_mut().skip(1).map(Target::close_all).sum();
    if closed > 0 {
        tracing::info!(trigger, closed, "Primary reachable, closed secondary connections");
        metrics::record_failback(trigger, closed);
    }
    closed
}

/// Priority-ordered failover dialer.
///
/// Creating a manager starts its maintenance task on the current Tokio runtime.
pub struct Manager {
    state: Arc<ManagerState>,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Create a manager over `config.targets` using `dialer`.
    pub fn new(config: FailoverConfig, dialer: DialerRef) -> Result<Self, ManagerError> {
        if config.targets.is_empty() {
            return Err(ManagerError::NoTargets);
        }
        for (i, address) in config.targets.iter().enumerate() {
            if config.targets[..i].contains(address) {
                return Err(ManagerError::DuplicateTarget(address.clone()));
            }
        }
        if config.dial_timeout_ms == 0 {
            return Err(ManagerError::ZeroDuration("dial_timeout_ms"));
        }
        if config.maintenance_interval_ms == 0 {
            return Err(ManagerError::ZeroDuration("maintenance_interval_ms"));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;

        let state = Arc::new(ManagerState {
            targets: Mutex::new(config.targets.iter().map(Target::new).collect()),
            dialer,
            dial_timeout: config.dial_timeout(),
            network: config.network,
            failback: AtomicBool::new(config.failback),
        });

        let shutdown = Shutdown::new();
        let task = runtime.spawn(maintenance::run(
            Arc::clone(&state),
            config.maintenance_interval(),
            shutdown.subscribe(),
        ));

        tracing::info!(
            targets = ?config.targets,
            dial_timeout_ms = config.dial_timeout_ms,
            failback = config.failback,
            "Failover manager started"
        );

        Ok(Self {
            state,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Manager dialing plain TCP targets.
    pub fn tcp<I, S>(targets: I, dial_timeout: Duration) -> Result<Self, ManagerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = FailoverConfig {
            dial_timeout_ms: dial_timeout.as_millis() as u64,
            ..FailoverConfig::new(targets)
        };
        Self::new(config, Arc::new(TcpDialer::new()))
    }

    /// Enable failback ("protagonist halo").
    pub fn with_failback(self) -> Self {
        self.set_failback(true);
        self
    }

    pub fn set_failback(&self, enabled: bool) {
        self.state.failback.store(enabled, Ordering::Relaxed);
    }

    pub fn failback_enabled(&self) -> bool {
        self.state.failback_enabled()
    }

    /// Network family used by [`Manager::connect`] and health probes.
    pub fn network(&self) -> Network {
        self.state.network
    }

    /// Dial with the configured network family.
    pub async fn connect(&self) -> Result<InstrumentedConnection, DialError> {
        self.dial(self.state.network, "").await
    }

    /// Dial the highest-priority reachable target.
    ///
    /// `address` is only logged; routing follows the configured target list.
    pub async fn dial(&self, network: Network, address: &str) -> Result<InstrumentedConnection, DialError> {
        self.dial_with_cancel(&CancellationToken::new(), network, address).await
    }

    /// Like [`Manager::dial`], aborting when `cancel` fires.
    ///
    /// The target being dialed at that moment records the cancellation as its
    /// last error.
    pub async fn dial_with_cancel(
        &self,
        cancel: &CancellationToken,
        network: Network,
        address: &str,
    ) -> Result<InstrumentedConnection, DialError> {
        if self.shutdown.is_triggered() {
            return Err(DialError::Closed);
        }
        tracing::trace!(%network, requested = address, "Dial requested");

        let count = self.state.targets.lock().len();
        for index in 0..count {
            let target_addr = {
                let targets = self.state.targets.lock();
                if targets[index].is_disabled() {
                    continue;
                }
                targets[index].address().to_string()
            };

            let dial_time = Utc::now();
            metrics::record_dial_attempt(&target_addr);

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = time::timeout(
                    self.state.dial_timeout,
                    self.state.dialer.dial(network, &target_addr),
                ) => Some(result),
            };

            let error = match attempt {
                None => {
                    self.state.targets.lock()[index].record_dial_failure(DialError::Cancelled.to_string(), dial_time);
                    tracing::debug!(addr = %target_addr, "Dial cancelled by caller");
                    return Err(DialError::Cancelled);
                }
                Some(Ok(Ok(stream))) => {
                    let (conn, handle) = InstrumentedConnection::new(stream);

                    let mut targets = self.state.targets.lock();
                    if self.shutdown.is_triggered() {
                        return Err(DialError::Closed);
                    }
                    // Disabled while we were dialing: this connection would be
                    // closed at once, so try the next target instead.
                    if targets[index].is_disabled() {
                        handle.close();
                        continue;
                    }

                    targets[index].register(handle, dial_time);
                    if index == 0 && self.state.failback_enabled() {
                        fail_back(&mut targets, "dial");
                    }
                    drop(targets);

                    if index > 0 {
                        tracing::info!(addr = %target_addr, priority = index, "Dialed secondary target");
                    } else {
                        tracing::debug!(addr = %target_addr, connection_id = %conn.id(), "Dialed primary target");
                    }
                    return Ok(conn);
                }
                Some(Ok(Err(e))) => e.to_string(),
                Some(Err(_)) => format!("dial timed out after {:?}", self.state.dial_timeout),
            };

            tracing::warn!(addr = %target_addr, priority = index, error = %error, "Dial failed, trying next target");
            metrics::record_dial_failure(&target_addr);
            self.state.targets.lock()[index].record_dial_failure(error, dial_time);
        }

        tracing::warn!("No target available");
        metrics::record_unavailable();
        Err(DialError::Unavailable)
    }

    /// Enable or disable the target at `address`. Returns false if there is none.
    pub fn set_disabled(&self, address: &str, disabled: bool) -> bool {
        let mut targets = self.state.targets.lock();
        match targets.iter_mut().find(|t| t.address() == address) {
            Some(target) => {
                let closed = target.set_disabled(disabled);
                tracing::info!(addr = %address, disabled, closed, "Target state changed");
                true
            }
            None => false,
        }
    }

    /// Run one recycle + health-probe pass now.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        maintenance::run_once(&self.state).await
    }

    pub fn target_count(&self) -> usize {
        self.state.targets.lock().len()
    }

    /// Snapshot of the target at `priority`.
    pub fn target(&self, priority: usize) -> Option<TargetSnapshot> {
        self.state.targets.lock().get(priority).map(|t| t.snapshot(priority))
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let targets = self.state.targets.lock();
        ManagerSnapshot {
            dial_timeout_ms: self.state.dial_timeout.as_millis() as u64,
            failback: self.state.failback_enabled(),
            closed: self.shutdown.is_triggered(),
            targets: targets
                .iter()
                .enumerate()
                .map(|(i, t)| t.snapshot(i))
                .collect(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stop the maintenance task and close every connection on every target.
    ///
    /// Only the first call succeeds.
    pub fn close(&self) -> Result<(), ManagerError> {
        self.shutdown.trigger().map_err(|_| ManagerError::AlreadyClosed)?;

        let closed: usize = self.state.targets.lock().iter_mut().map(Target::close_all).sum();
        tracing::info!(closed, "Failover manager closed");
        Ok(())
    }

    /// Close the manager and wait for the maintenance task to exit.
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        self.close()?;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Maintenance task ended abnormally");
            }
        }
        Ok(())
    }
}

/// Dropping an open manager stops its maintenance task. Connections already
/// handed out stay usable.
impl Drop for Manager {
    fn drop(&mut self) {
        let _ = self.shutdown.trigger();
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("dial_timeout", &self.state.dial_timeout)
            .field("failback", &self.state.failback_enabled())
            .field("closed", &self.shutdown.is_triggered())
            .finish()
    }
}
