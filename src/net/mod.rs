//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (manager dial):
//!     dialer.rs (resolve + connect, family filter)
//!     → connection.rs (type-erased stream, connection ID)
//!     → instrumented.rs (traffic counters, shared close state)
//!     → handed to caller, handle kept by the owning target
//!
//! Inbound (forwarding front-end):
//!     listener.rs (accept loop, connection limits)
//!     → forward (dial a target, copy bytes both ways)
//! ```
//!
//! # Design Decisions
//! - Dialers never apply timeouts; the manager owns the dial deadline
//! - The manager can close any connection it handed out, at any time
//! - Bounded accept queue prevents resource exhaustion

pub mod connection;
pub mod dialer;
pub mod instrumented;
pub mod listener;

pub use connection::{BoxConnection, Connection, ConnectionId, Network};
pub use dialer::{dialer_fn, Dialer, DialerRef, TcpDialer};
pub use instrumented::{unwrap, ConnectionHandle, ConnectionStats, InstrumentedConnection};
