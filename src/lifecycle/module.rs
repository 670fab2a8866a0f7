//! Load/unload control-plane hooks.
//!
//! A [`Module`] is what a host loads and unloads. Neither hook performs
//! blocking socket I/O: `on_load` spawns a worker and waits only for its
//! setup outcome, `on_unload` runs the worker's stop sequence and returns
//! once the thread has joined.

use thiserror::Error;

use crate::config::WorkerConfig;
use crate::lifecycle::worker::{Service, Worker, WorkerError, WorkerState};

/// Errors returned by `on_load`.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {0} is already loaded")]
    AlreadyLoaded(&'static str),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// A unit the host can load and unload.
pub trait Module: Send {
    fn name(&self) -> &'static str;

    /// Start the module. Must return promptly.
    fn on_load(&mut self) -> Result<(), ModuleError>;

    /// Stop the module. Returns only after all of its threads have joined.
    fn on_unload(&mut self);

    /// Whether the module still has work running.
    fn is_active(&self) -> bool;
}

/// Runs one [`Service`] on a worker per load.
///
/// The service value is kept as a template and cloned on each load, so a
/// module can be unloaded and loaded again.
pub struct ServiceModule<S> {
    service: S,
    config: WorkerConfig,
    worker: Option<Worker>,
}

impl<S: Service + Clone> ServiceModule<S> {
    pub fn new(service: S, config: WorkerConfig) -> Self {
        Self {
            service,
            config,
            worker: None,
        }
    }

    /// The live worker, if loaded.
    pub fn worker(&self) -> Option<&Worker> {
        self.worker.as_ref()
    }

    pub fn state(&self) -> Option<WorkerState> {
        self.worker.as_ref().map(Worker::state)
    }
}

impl<S: Service + Clone> Module for ServiceModule<S> {
    fn name(&self) -> &'static str {
        self.service.name()
    }

    fn on_load(&mut self) -> Result<(), ModuleError> {
        if self.worker.is_some() {
            return Err(ModuleError::AlreadyLoaded(self.name()));
        }

        tracing::info!(module = self.name(), "Loading module");
        let worker = Worker::spawn(self.service.clone(), &self.config).map_err(|e| {
            tracing::error!(module = self.name(), error = %e, "Module failed to load");
            e
        })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn on_unload(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            tracing::info!(module = self.name(), "Unloading module");
            worker.stop();
            tracing::info!(module = self.name(), "Module unloaded");
        }
    }

    fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}
