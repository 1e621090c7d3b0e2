//! Dial target abstraction.
//!
//! # Responsibilities
//! - Represent a single prioritized dial destination
//! - Own the bookkeeping handles of every connection dialed to it
//! - Track enable state and the outcome of the last dial
//!
//! Every method here runs under the manager lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::failover::types::TargetSnapshot;
use crate::net::{ConnectionHandle, ConnectionId};

/// A single dial target.
#[derive(Debug)]
pub struct Target {
    address: String,
    disabled: bool,
    last_dial_error: Option<String>,
    last_dial_time: Option<DateTime<Utc>>,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl Target {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            disabled: false,
            last_dial_error: None,
            last_dial_time: None,
            connections: HashMap::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn last_dial_error(&self) -> Option<&str> {
        self.last_dial_error.as_deref()
    }

    pub fn last_dial_time(&self) -> Option<DateTime<Utc>> {
        self.last_dial_time
    }

    /// Size of the connection map, closed entries included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Enable or disable the target.
    ///
    /// Disabling closes every live connection right away; the stale entries
    /// stay in the map until the next recycle pass. Returns how many were closed.
    pub fn set_disabled(&mut self, disabled: bool) -> usize {
        self.disabled = disabled;
        if disabled {
            self.close_all()
        } else {
            0
        }
    }

    pub(crate) fn record_dial_failure(&mut self, error: String, at: DateTime<Utc>) {
        self.last_dial_error = Some(error);
        self.last_dial_time = Some(at);
    }

    pub(crate) fn register(&mut self, handle: ConnectionHandle, at: DateTime<Utc>) {
        self.last_dial_error = None;
        self.last_dial_time = Some(at);
        self.connections.insert(handle.id().clone(), handle);
    }

    /// Close every connection that is still open. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        self.connections
            .values()
            .filter(|handle| handle.close())
            .count()
    }

    /// Drop dead connections from the map. Returns how many were removed.
    ///
    /// A disabled target loses every connection; an enabled one only those
    /// that are closed or saw an I/O error.
    pub(crate) fn recycle(&mut self) -> usize {
        let before = self.connections.len();

        if self.disabled {
            self.close_all();
            self.connections.clear();
            return before;
        }

        self.connections.retain(|_, handle| {
            if handle.has_error() {
                handle.close();
                false
            } else {
                true
            }
        });
        before - self.connections.len()
    }

    pub fn snapshot(&self, priority: usize) -> TargetSnapshot {
        TargetSnapshot {
            address: self.address.clone(),
            priority,
            disabled: self.disabled,
            last_dial_error: self.last_dial_error.clone(),
            last_dial_time: self.last_dial_time,
            connections: self
                .connections
                .iter()
                .map(|(id, handle)| (id.to_string(), handle.stats()))
                .collect(),
        }
    }
}
