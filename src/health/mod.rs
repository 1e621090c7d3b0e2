//! Health and maintenance subsystem.
//!
//! # Data Flow
//! ```text
//! maintenance.rs (fixed interval, started with the manager):
//!     tick
//!     → recycle: disabled targets emptied, broken connections removed
//!     → probe: throwaway dial to the primary
//!         → answered + failback on: close every secondary connection
//!         → failed: nothing, wait for the next tick
//! ```
//!
//! # Design Decisions
//! - Recycling is batched on the tick, not triggered by the failing I/O call
//! - Only the primary is probed; secondaries are judged by their traffic
//! - The probe connection is closed immediately and never handed out

pub(crate) mod maintenance;
