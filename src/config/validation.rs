//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, header names and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Malformed trusted ranges are not errors; they are skipped when the set is built

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("cdn.client_ip_headers must name at least one header")]
    NoClientIpHeaders,

    #[error("{0:?} cannot be both the forwarding chain and a client IP header")]
    HeaderConflict(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("observability.log_level: unknown level {0:?}")]
    InvalidLogLevel(String),
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    let cdn = &config.cdn;
    let forwarded_for = HeaderName::from_bytes(cdn.forwarded_for_header.as_bytes()).ok();
    if forwarded_for.is_none() {
        errors.push(ValidationError::InvalidHeaderName {
            field: "cdn.forwarded_for_header",
            value: cdn.forwarded_for_header.clone(),
        });
    }

    if cdn.client_ip_headers.is_empty() {
        errors.push(ValidationError::NoClientIpHeaders);
    }

    for name in &cdn.client_ip_headers {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(parsed) if forwarded_for.as_ref() == Some(&parsed) => {
                errors.push(ValidationError::HeaderConflict(name.clone()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidHeaderName {
                field: "cdn.client_ip_headers",
                value: name.clone(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
