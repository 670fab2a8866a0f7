//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every address parses as an endpoint
//! - Validate value ranges (buffers > 0, timeouts > 0, backoff base <= cap)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: KsockConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::KsockConfig;
use crate::net::Endpoint;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("worker: backoff_base_ms ({base}) exceeds backoff_max_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
}

/// Parse an address field, reporting the field name on failure.
pub fn parse_endpoint(field: &'static str, value: &str) -> Result<Endpoint, ValidationError> {
    Endpoint::parse(value).map_err(|_| ValidationError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

pub fn validate_config(config: &KsockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let addresses = [
        ("tcp_server.bind_address", &config.tcp_server.bind_address),
        ("tcp_client.server_address", &config.tcp_client.server_address),
        ("udp_server.bind_address", &config.udp_server.bind_address),
        ("udp_client.server_address", &config.udp_client.server_address),
    ];
    for (field, value) in addresses {
        if let Err(e) = parse_endpoint(field, value) {
            errors.push(e);
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive = [
        ("tcp_server.backlog", config.tcp_server.backlog.max(0) as u64),
        ("tcp_server.recv_buffer_size", config.tcp_server.recv_buffer_size as u64),
        ("tcp_server.connection_timeout_secs", config.tcp_server.connection_timeout_secs),
        ("tcp_client.connect_timeout_secs", config.tcp_client.connect_timeout_secs),
        ("tcp_client.recv_timeout_secs", config.tcp_client.recv_timeout_secs),
        ("tcp_client.recv_buffer_size", config.tcp_client.recv_buffer_size as u64),
        ("udp_server.recv_buffer_size", config.udp_server.recv_buffer_size as u64),
        ("udp_server.recv_timeout_ms", config.udp_server.recv_timeout_ms),
        ("udp_client.recv_timeout_secs", config.udp_client.recv_timeout_secs),
        ("udp_client.recv_buffer_size", config.udp_client.recv_buffer_size as u64),
        ("worker.setup_timeout_secs", config.worker.setup_timeout_secs),
        ("worker.backoff_base_ms", config.worker.backoff_base_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.worker.backoff_base_ms > config.worker.backoff_max_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.worker.backoff_base_ms,
            max: config.worker.backoff_max_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
