//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host
//! process and its service modules. All types derive Serde traits for
//! deserialization from config files, and every section has defaults so an
//! empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KsockConfig {
    /// Stream server module.
    pub tcp_server: TcpServerConfig,

    /// Stream client module.
    pub tcp_client: TcpClientConfig,

    /// Datagram server module.
    pub udp_server: UdpServerConfig,

    /// Datagram client module.
    pub udp_client: UdpClientConfig,

    /// Worker lifecycle tuning shared by all modules.
    pub worker: WorkerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// TCP server module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpServerConfig {
    /// Bind address (e.g., "0.0.0.0:12345").
    pub bind_address: String,

    /// Pending-connection queue length.
    pub backlog: i32,

    /// Capacity of the per-connection receive buffer.
    pub recv_buffer_size: usize,

    /// Set `SO_REUSEADDR` before binding.
    pub reuse_address: bool,

    /// Optional text sent back after each received message.
    pub reply: Option<String>,

    /// How long one accepted connection may stay silent, in seconds.
    pub connection_timeout_secs: u64,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:12345".to_string(),
            backlog: 5,
            recv_buffer_size: 1024,
            reuse_address: true,
            reply: None,
            connection_timeout_secs: 5,
        }
    }
}

impl TcpServerConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

/// TCP client module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpClientConfig {
    /// Server to connect to.
    pub server_address: String,

    /// Message sent once connected.
    pub message: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Wait for one reply after sending.
    pub await_reply: bool,

    /// Receive timeout for the reply in seconds.
    pub recv_timeout_secs: u64,

    /// Capacity of the reply buffer.
    pub recv_buffer_size: usize,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:12345".to_string(),
            message: "Hello from kernel TCP client!".to_string(),
            connect_timeout_secs: 5,
            await_reply: false,
            recv_timeout_secs: 2,
            recv_buffer_size: 1024,
        }
    }
}

impl TcpClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }
}

/// UDP server module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UdpServerConfig {
    /// Bind address (e.g., "0.0.0.0:4444").
    pub bind_address: String,

    /// Capacity of the datagram buffer.
    pub recv_buffer_size: usize,

    /// Acknowledgement sent to each datagram's source.
    pub reply: String,

    /// Upper bound on a single receive, in milliseconds.
    pub recv_timeout_ms: u64,
}

impl Default for UdpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4444".to_string(),
            recv_buffer_size: 256,
            reply: "ACK from UDP Server".to_string(),
            recv_timeout_ms: 500,
        }
    }
}

impl UdpServerConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// UDP client module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UdpClientConfig {
    /// Server the datagram is sent to.
    pub server_address: String,

    /// Datagram payload.
    pub message: String,

    /// How long to wait for the acknowledgement, in seconds.
    pub recv_timeout_secs: u64,

    /// Capacity of the reply buffer.
    pub recv_buffer_size: usize,
}

impl Default for UdpClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:4444".to_string(),
            message: "Hello UDP Server".to_string(),
            recv_timeout_secs: 2,
            recv_buffer_size: 256,
        }
    }
}

impl UdpClientConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }
}

/// Worker lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub backoff_max_ms: u64,

    /// How long `on_load` waits for the worker's setup outcome, in seconds.
    pub setup_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
            setup_timeout_secs: 10,
        }
    }
}

impl WorkerConfig {
    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
