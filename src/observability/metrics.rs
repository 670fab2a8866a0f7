//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ksock_connections_accepted_total` (counter): connections accepted, by module
//! - `ksock_bytes_received_total` (counter): payload bytes received, by module
//! - `ksock_bytes_sent_total` (counter): payload bytes sent, by module
//! - `ksock_transient_errors_total` (counter): retried accept/recv failures, by module
//! - `ksock_workers_running` (gauge): workers currently inside their service loop
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless the host enables the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub fn record_connection_accepted(module: &'static str) {
    counter!("ksock_connections_accepted_total", "module" => module).increment(1);
}

pub fn record_bytes_received(module: &'static str, bytes: usize) {
    counter!("ksock_bytes_received_total", "module" => module).increment(bytes as u64);
}

pub fn record_bytes_sent(module: &'static str, bytes: usize) {
    counter!("ksock_bytes_sent_total", "module" => module).increment(bytes as u64);
}

pub fn record_transient_error(module: &'static str) {
    counter!("ksock_transient_errors_total", "module" => module).increment(1);
}

pub fn record_worker_running(module: &'static str, running: bool) {
    let gauge = gauge!("ksock_workers_running", "module" => module);
    if running {
        gauge.increment(1.0);
    } else {
        gauge.decrement(1.0);
    }
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_connection_accepted("test");
        record_bytes_received("test", 42);
        record_bytes_sent("test", 7);
        record_transient_error("test");
        record_worker_running("test", true);
        record_worker_running("test", false);
    }
}
