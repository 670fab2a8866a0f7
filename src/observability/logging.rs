//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Resolve the log filter (`RUST_LOG` first, then configured level)
//!
//! Logging is a sink only: nothing here ever surfaces as a socket or worker error.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter: `RUST_LOG` if set and valid, else `ksock=<log_level>`.
pub fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = if config.log_level.contains('=') {
            config.log_level.clone()
        } else {
            format!("ksock={}", config.log_level)
        };
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("ksock=info"))
    })
}

/// Install the global subscriber. A second call is ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let result = tracing_subscriber::registry()
        .with(build_filter(config))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
