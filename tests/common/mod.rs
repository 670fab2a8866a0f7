//! Shared utilities for integration testing.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use ksock::config::WorkerConfig;
use ksock::lifecycle::{Module, Service, ServiceModule};
use ksock::net::Endpoint;
use ksock::services::Message;

/// Worker tuning that keeps failing tests fast.
pub fn fast_worker() -> WorkerConfig {
    WorkerConfig {
        backoff_base_ms: 5,
        backoff_max_ms: 50,
        setup_timeout_secs: 5,
    }
}

/// Wrap `service` in a module and load it, panicking on setup failure.
pub fn load<S: Service + Clone>(service: S) -> ServiceModule<S> {
    let mut module = ServiceModule::new(service, fast_worker());
    module.on_load().unwrap();
    module
}

/// The endpoint a loaded module's long-lived handle is bound to.
pub fn bound_endpoint<S: Service + Clone>(module: &ServiceModule<S>) -> Endpoint {
    module
        .worker()
        .and_then(|w| w.socket())
        .expect("module has no live socket")
        .local_endpoint()
        .unwrap()
}

/// Wait for the next message a service forwarded.
#[allow(dead_code)]
pub fn expect_message(rx: &Receiver<Message>) -> Message {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("no message delivered within 5s")
}

/// Poll until `module` reports inactive.
#[allow(dead_code)]
pub fn wait_inactive<M: Module>(module: &M, within: Duration) -> bool {
    let deadline = std::time::Instant::now() + within;
    while std::time::Instant::now() < deadline {
        if !module.is_active() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
