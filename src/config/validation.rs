//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the values. All problems
//! are collected instead of stopping at the first one.

use std::net::IpAddr;

use crate::config::schema::ProxyConfig;
use crate::forward::target::UpstreamTarget;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.address {0:?} is not an IP address")]
    ListenAddress(String),
    #[error("upstream.url is invalid: {0}")]
    UpstreamUrl(String),
    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let address = config.listener.address.trim_start_matches('[').trim_end_matches(']');
    if address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::ListenAddress(config.listener.address.clone()));
    }

    if let Err(e) = UpstreamTarget::parse(&config.upstream.url) {
        errors.push(ValidationError::UpstreamUrl(e.to_string()));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("request_timeout_ms"));
    }
    if config.timeouts.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_ms"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
