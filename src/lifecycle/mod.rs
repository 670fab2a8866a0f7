//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Load (host.rs → module.rs → worker.rs):
//!     on_load → spawn worker thread → open + establish → report setup → serve loop
//!
//! Unload (module.rs → worker.rs):
//!     on_unload → shutdown published handle → raise stop flag (shutdown.rs)
//!               → shutdown tracked connection → join thread → close handle
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → host unloads every module
//! ```
//!
//! # Design Decisions
//! - One OS thread per worker; blocking socket calls never run on hook callers
//! - Cancellation is forced (transport shutdown) plus cooperative (flag)
//! - Unload is ordered and idempotent; close races are harmless

pub mod host;
pub mod module;
pub mod shutdown;
pub mod signals;
pub mod worker;

pub use host::ModuleHost;
pub use module::{Module, ModuleError, ServiceModule};
pub use shutdown::StopSignal;
pub use worker::{ConnectionSlot, Flow, Service, Tracked, Worker, WorkerError, WorkerState};
