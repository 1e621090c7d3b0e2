//! Failover error types and inspection snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::net::ConnectionStats;

/// Errors surfaced to a dial caller.
///
/// Per-target failures never appear here; they are recorded on the target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    /// Every target is disabled or every dial attempt failed.
    #[error("no target available")]
    Unavailable,

    /// The caller's cancellation token fired during a dial.
    #[error("dial cancelled")]
    Cancelled,

    /// The manager has been closed.
    #[error("manager closed")]
    Closed,
}

/// Errors from constructing or closing a manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("at least one target address is required")]
    NoTargets,

    #[error("target '{0}' is listed more than once")]
    DuplicateTarget(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("manager must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("manager already closed")]
    AlreadyClosed,
}

/// Serializable view of a manager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSnapshot {
    pub dial_timeout_ms: u64,
    pub failback: bool,
    pub closed: bool,
    pub targets: Vec<TargetSnapshot>,
}

/// Serializable view of one target and its live connections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSnapshot {
    pub address: String,
    /// 0 is the primary.
    pub priority: usize,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dial_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dial_time: Option<DateTime<Utc>>,
    pub connections: BTreeMap<String, ConnectionStats>,
}

impl TargetSnapshot {
    /// Connections not yet closed.
    pub fn open_connections(&self) -> usize {
        self.connections.values().filter(|c| !c.closed).count()
    }
}

/// Result of probing the primary target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ProbeOutcome {
    /// The primary is disabled; no probe was made.
    Skipped,
    /// The primary accepted a connection.
    Healthy { failback_closed: usize },
    /// The probe dial failed or timed out.
    Unreachable { error: String },
}

/// What one maintenance pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub recycled: usize,
    pub probe: ProbeOutcome,
}
