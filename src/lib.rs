//! Priority failover dialer.
//!
//! A [`Manager`] owns an ordered list of equivalent targets (primary first)
//! and hands out connections to the highest-priority one that answers. A
//! background task reaps broken connections and probes the primary so that,
//! with failback enabled, traffic returns to it as soon as it recovers.

pub mod admin;
pub mod config;
pub mod failover;
pub mod forward;
mod health;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{DualconnConfig, FailoverConfig};
pub use failover::{DialError, Manager, ManagerError};
pub use lifecycle::Shutdown;
pub use net::{unwrap, Connection, Dialer, InstrumentedConnection, Network, TcpDialer};
