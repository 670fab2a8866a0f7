//! Worker lifecycle manager.
//!
//! A worker is one dedicated thread that owns one long-lived socket handle
//! and runs a [`Service`] loop on it.
//!
//! # State Transitions
//! ```text
//! Created → Bound:          open + establish (bind/listen or connect)
//! Created → Stopped:        any setup failure, reported to the caller of spawn
//! Bound → Running:          service loop entered
//! Running → StopRequested:  stop(): shutdown the handle, raise the flag
//! StopRequested → Stopped:  loop exits, handle closed, thread joined
//! ```
//!
//! The handle is published through an `ArcSwapOption` once it exists and
//! cleared once it is closed. The manager only ever loads it to shut it down
//! or close it, so it never sees a half-built or released handle.

use std::net::Shutdown;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::config::WorkerConfig;
use crate::lifecycle::shutdown::StopSignal;
use crate::net::{SocketError, SocketHandle, SocketResult};
use crate::observability::metrics;
use crate::resilience::Backoff;

/// What the loop should do after one service iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run another iteration.
    Continue,
    /// The service is done; close the handle and exit.
    Finished,
}

/// The behaviour a worker runs.
///
/// `open` and `establish` make up the setup phase; their errors are reported
/// to whoever spawned the worker. `serve` runs once per loop iteration.
pub trait Service: Send + 'static {
    /// Short name used for the thread, logs and metrics.
    fn name(&self) -> &'static str;

    /// Create the long-lived handle and apply options.
    fn open(&mut self) -> SocketResult<SocketHandle>;

    /// Bring the handle into its serving role.
    fn establish(&mut self, socket: &SocketHandle) -> SocketResult<()>;

    /// Run one iteration of the service loop.
    fn serve(&mut self, socket: &SocketHandle) -> SocketResult<Flow>;

    /// Receive the slot for connections served inside `serve`. Called once,
    /// on the worker thread, before `open`.
    fn attach(&mut self, _slot: ConnectionSlot) {}
}

/// Lifecycle position of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Bound = 1,
    Running = 2,
    StopRequested = 3,
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Bound,
            2 => WorkerState::Running,
            3 => WorkerState::StopRequested,
            _ => WorkerState::Stopped,
        }
    }
}

/// Errors reported while starting a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker setup failed: {0}")]
    Setup(#[from] SocketError),

    #[error("worker setup did not finish within {0:?}")]
    SetupTimeout(Duration),

    #[error("worker exited before reporting its setup outcome")]
    Vanished,
}

/// State shared between the manager and its thread.
#[derive(Debug)]
struct Shared {
    name: &'static str,
    state: AtomicU8,
    socket: ArcSwapOption<SocketHandle>,
    /// Accepted connection currently being served, if any.
    connection: ArcSwapOption<SocketHandle>,
    stop: StopSignal,
}

impl Shared {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move `from → to` only if no stop has been requested meanwhile.
    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Close the published handle and clear the publication.
    fn release(&self) {
        if let Some(socket) = self.socket.swap(None) {
            socket.close();
        }
    }
}

/// Publishes the connection a service is serving so that a stop can shut it
/// down along with the long-lived handle.
#[derive(Debug, Clone)]
pub struct ConnectionSlot {
    shared: Arc<Shared>,
}

impl ConnectionSlot {
    /// Publish `handle` until the returned guard is dropped.
    pub fn track(&self, handle: Arc<SocketHandle>) -> Tracked<'_> {
        self.shared.connection.store(Some(Arc::clone(&handle)));
        // A stop that loaded the slot before the store missed this handle.
        if self.shared.stop.is_triggered() {
            handle.shutdown(Shutdown::Both);
        }
        Tracked { slot: self }
    }
}

/// Clears the connection slot on drop.
#[must_use = "the connection is untracked as soon as the guard drops"]
#[derive(Debug)]
pub struct Tracked<'a> {
    slot: &'a ConnectionSlot,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.slot.shared.connection.store(None);
    }
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct Worker {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker and wait for its setup outcome.
    ///
    /// Only the setup phase is awaited; blocking service calls happen on the
    /// worker thread. If setup has not finished within
    /// `config.setup_timeout()`, the worker is stopped and `SetupTimeout`
    /// is returned.
    pub fn spawn<S: Service>(service: S, config: &WorkerConfig) -> Result<Self, WorkerError> {
        let name = service.name();
        let shared = Arc::new(Shared {
            name,
            state: AtomicU8::new(WorkerState::Created as u8),
            socket: ArcSwapOption::empty(),
            connection: ArcSwapOption::empty(),
            stop: StopSignal::new(),
        });

        let (setup_tx, setup_rx) = mpsc::sync_channel(1);
        let backoff = Backoff::from_config(config);
        let thread_shared = Arc::clone(&shared);

        let thread = Builder::new()
            .name(format!("ksock-{name}"))
            .spawn(move || run(service, thread_shared, backoff, setup_tx))
            .map_err(WorkerError::Spawn)?;

        let mut worker = Self {
            shared,
            thread: Some(thread),
        };

        match setup_rx.recv_timeout(config.setup_timeout()) {
            Ok(Ok(())) => {
                tracing::info!(worker = name, "Worker started");
                Ok(worker)
            }
            Ok(Err(e)) => {
                worker.stop();
                Err(WorkerError::Setup(e))
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(worker = name, "Worker setup timed out, stopping it");
                worker.stop();
                Err(WorkerError::SetupTimeout(config.setup_timeout()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                worker.stop();
                Err(WorkerError::Vanished)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// The published long-lived handle, if one is live.
    pub fn socket(&self) -> Option<Arc<SocketHandle>> {
        self.shared.socket.load_full()
    }

    /// Whether the worker thread has exited on its own or been joined.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Run the stop sequence and join the thread. Safe to call repeatedly.
    ///
    /// 1. shut the published handle down so blocked accept/recv return
    /// 2. raise the cancellation flag
    /// 3. shut down the tracked connection, if one is being served
    /// 4. join the thread
    /// 5. close the handle if the worker did not
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        let _ = self.shared.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            (s != WorkerState::Stopped as u8).then_some(WorkerState::StopRequested as u8)
        });

        if let Some(socket) = self.shared.socket.load_full() {
            socket.shutdown(Shutdown::Both);
        }
        self.shared.stop.trigger();
        // A handle published after the first pass would otherwise miss the shutdown.
        if let Some(socket) = self.shared.socket.load_full() {
            socket.shutdown(Shutdown::Both);
        }
        if let Some(connection) = self.shared.connection.load_full() {
            connection.shutdown(Shutdown::Both);
        }

        if thread.join().is_err() {
            tracing::error!(worker = self.shared.name, "Worker thread panicked");
        }

        self.shared.release();
        self.shared.set_state(WorkerState::Stopped);

        tracing::info!(worker = self.shared.name, "Worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: Service>(
    mut service: S,
    shared: Arc<Shared>,
    mut backoff: Backoff,
    setup_tx: SyncSender<SocketResult<()>>,
) {
    let name = shared.name;
    service.attach(ConnectionSlot {
        shared: Arc::clone(&shared),
    });

    let socket = match service.open() {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            tracing::error!(worker = name, error = %e, "Failed to create socket");
            shared.set_state(WorkerState::Stopped);
            let _ = setup_tx.send(Err(e));
            return;
        }
    };
    shared.socket.store(Some(Arc::clone(&socket)));

    let established = if shared.stop.is_triggered() {
        Err(SocketError::Interrupted)
    } else {
        service.establish(&socket)
    };
    if let Err(e) = established {
        tracing::error!(worker = name, error = %e, "Worker setup failed");
        shared.release();
        shared.set_state(WorkerState::Stopped);
        let _ = setup_tx.send(Err(e));
        return;
    }

    shared.transition(WorkerState::Created, WorkerState::Bound);
    // The manager may have given up waiting; the stop flag covers that case.
    let _ = setup_tx.send(Ok(()));
    drop(setup_tx);

    if shared.transition(WorkerState::Bound, WorkerState::Running) {
        metrics::record_worker_running(name, true);
        service_loop(&mut service, &socket, &shared, &mut backoff);
        metrics::record_worker_running(name, false);
    }

    shared.release();
    shared.set_state(WorkerState::Stopped);
    tracing::debug!(worker = name, "Worker thread exiting");
}

fn service_loop<S: Service>(
    service: &mut S,
    socket: &SocketHandle,
    shared: &Shared,
    backoff: &mut Backoff,
) {
    let name = shared.name;

    while !shared.stop.is_triggered() {
        match service.serve(socket) {
            Ok(Flow::Continue) => backoff.reset(),
            Ok(Flow::Finished) => {
                tracing::debug!(worker = name, "Service finished");
                break;
            }
            Err(e) if shared.stop.is_triggered() => {
                tracing::info!(worker = name, reason = %e, "Service loop released for shutdown");
                break;
            }
            Err(SocketError::Interrupted) => {
                if socket.is_shut_down() {
                    tracing::info!(worker = name, "Socket shut down, leaving service loop");
                    break;
                }
            }
            Err(SocketError::TimedOut) => {
                tracing::trace!(worker = name, "Receive timed out");
            }
            Err(e) if e.is_transient() => {
                metrics::record_transient_error(name);
                let delay = backoff.next_delay();
                tracing::warn!(
                    worker = name,
                    error = %e,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Transient socket error, retrying"
                );
                if shared.stop.wait_timeout(delay) {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(worker = name, error = %e, "Fatal socket error, stopping worker");
                break;
            }
        }
    }
}
