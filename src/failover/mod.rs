//! Failover subsystem.
//!
//! # Data Flow
//! ```text
//! Manager::dial
//!     → walk targets in priority order (0 = primary)
//!         → disabled: skip, no dial, nothing recorded
//!         → dial fails / times out: record on target, try next
//!         → dial succeeds: wrap, register under target, failback if primary
//!     → every target skipped or failed: DialError::Unavailable
//! ```
//!
//! # Design Decisions
//! - Strict priority, no load balancing across healthy targets
//! - Target list is fixed at construction; targets are toggled, never removed
//! - A single manager-wide lock guards every target and connection map

pub mod manager;
pub mod target;
pub mod types;

pub use manager::Manager;
pub use target::Target;
pub use types::{
    DialError, MaintenanceReport, ManagerError, ManagerSnapshot, ProbeOutcome, TargetSnapshot,
};
