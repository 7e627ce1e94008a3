//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (months > 0, timeouts > 0, max uses >= 1)
//! - Reject empty secrets for enabled features
//! - Keep CASA replay counters alive for as long as a token can be accepted
//! - Check addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    for (field, months) in [
        ("embargo.scientific_months", config.embargo.scientific_months),
        ("embargo.cultural_months", config.embargo.cultural_months),
        ("embargo.default_months", config.embargo.default_months),
    ] {
        if months == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    let casa = &config.casa;
    if casa.enabled {
        if casa.secret.is_empty() {
            errors.push(ValidationError::new("casa.secret", "required when CASA is enabled"));
        }
        if casa.max_uses == 0 {
            errors.push(ValidationError::new("casa.max_uses", "must be at least 1"));
        }
        if casa.max_lifetime_secs == 0 {
            errors.push(ValidationError::new(
                "casa.max_lifetime_secs",
                "must be greater than zero",
            ));
        }
        // A token stays acceptable for up to max_lifetime + clock_skew after its first use.
        let accepted_for_ms = casa
            .max_lifetime_secs
            .saturating_mul(1000)
            .saturating_add(casa.clock_skew_ms);
        if casa.nonce_window_secs == 0 {
            errors.push(ValidationError::new(
                "casa.nonce_window_secs",
                "must be greater than zero",
            ));
        } else if casa.nonce_window_secs.saturating_mul(1000) < accepted_for_ms {
            errors.push(ValidationError::new(
                "casa.nonce_window_secs",
                format!("must cover max_lifetime_secs plus clock_skew_ms ({} ms)", accepted_for_ms),
            ));
        }
        if casa.store_timeout_ms == 0 {
            errors.push(ValidationError::new("casa.store_timeout_ms", "must be greater than zero"));
        }
    }

    if config.client_ip.debug_header.trim().is_empty() {
        errors.push(ValidationError::new("client_ip.debug_header", "must not be empty"));
    }
    if config.client_ip.forwarded_header.trim().is_empty() {
        errors.push(ValidationError::new("client_ip.forwarded_header", "must not be empty"));
    }
    if config.referer.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("referer.cookie_name", "must not be empty"));
    }

    let repository = &config.repository;
    if repository.call_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "repository.call_timeout_ms",
            "must be greater than zero",
        ));
    }
    if repository.max_attempts == 0 {
        errors.push(ValidationError::new("repository.max_attempts", "must be at least 1"));
    }
    if repository.backoff_base_ms > repository.backoff_max_ms {
        errors.push(ValidationError::new("repository.backoff_base_ms", "exceeds backoff_max_ms"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
