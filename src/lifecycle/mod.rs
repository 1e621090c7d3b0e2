//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Manager::close / signal → trigger once → maintenance task exits
//!                                            → listener and admin stop accepting
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal resolves → binary triggers shutdown
//! ```
//!
//! # Design Decisions
//! - The shutdown signal is once-only; a second trigger is reported, not ignored
//! - Ordered shutdown: stop accept, close manager, exit

pub mod shutdown;
pub mod signals;

pub use shutdown::{AlreadyTriggered, Shutdown};
