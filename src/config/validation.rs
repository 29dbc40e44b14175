//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep the proxy prefix clear of the health endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An address field does not parse as `ip:port`.
    InvalidAddress { field: &'static str, value: String },
    /// The proxy prefix is unusable.
    InvalidPrefix(String),
    /// A timeout is zero.
    ZeroTimeout(&'static str),
    /// A strip-header entry is not a valid header name.
    InvalidHeaderName(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{} is not a socket address: {}", field, value)
            }
            ValidationError::InvalidPrefix(p) => write!(f, "invalid path_prefix: {:?}", p),
            ValidationError::ZeroTimeout(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::InvalidHeaderName(h) => write!(f, "invalid header name in strip_headers: {:?}", h),
        }
    }
}

/// Check a parsed configuration for semantic errors.
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

    let prefix = &config.proxy.path_prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') || prefix == "/health" {
        errors.push(ValidationError::InvalidPrefix(prefix.clone()));
    }

    for name in &config.proxy.strip_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.timeouts.close_grace_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.close_grace_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
