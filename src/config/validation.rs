//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Reject duplicate or empty targets
//! - Check bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DualconnConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::DualconnConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("failover.targets must list at least one target")]
    NoTargets,

    #[error("failover.targets[{0}] is empty")]
    EmptyTarget(usize),

    #[error("failover.targets contains '{0}' more than once")]
    DuplicateTarget(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,

    #[error("{field} '{value}' is not a socket address")]
    BadAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &DualconnConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let failover = &config.failover;

    if failover.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    let mut seen = HashSet::new();
    for (i, target) in failover.targets.iter().enumerate() {
        if target.trim().is_empty() {
            errors.push(ValidationError::EmptyTarget(i));
        } else if !seen.insert(target.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.clone()));
        }
    }

    if failover.dial_timeout_ms == 0 {
        errors.push(ValidationError::Zero("failover.dial_timeout_ms"));
    }
    if failover.maintenance_interval_ms == 0 {
        errors.push(ValidationError::Zero("failover.maintenance_interval_ms"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}
