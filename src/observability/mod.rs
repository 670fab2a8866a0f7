//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sockets, workers and modules produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields (worker, peer, connection_id) instead of formatted strings
//! - Metrics are cheap and no-ops without an installed recorder

pub mod logging;
pub mod metrics;
