//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DualconnConfig (validated, immutable)
//!     → FailoverConfig handed to the manager, the rest to the binary
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; target order is fixed for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{AdminConfig, DualconnConfig, FailoverConfig, ListenerConfig, ObservabilityConfig};
pub use validation::ValidationError;
