//! Accepted connections.
//!
//! # Responsibilities
//! - Generate unique connection IDs for log correlation
//! - Own the per-connection handle produced by `accept`
//! - Close that handle on every exit path, including early returns

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::net::endpoint::Endpoint;
use crate::net::socket::SocketHandle;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A connected handle produced by `accept`, closed when dropped.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    handle: Arc<SocketHandle>,
    peer: Endpoint,
}

impl Connection {
    pub fn new(handle: SocketHandle, peer: Endpoint) -> Self {
        Self {
            id: ConnectionId::new(),
            handle: Arc::new(handle),
            peer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Endpoint {
        self.peer
    }

    pub fn handle(&self) -> &SocketHandle {
        &self.handle
    }

    /// A second reference to the handle, for shutting it down from another thread.
    pub fn shared_handle(&self) -> Arc<SocketHandle> {
        Arc::clone(&self.handle)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handle.close();
        tracing::trace!(connection_id = %self.id, peer = %self.peer, "Connection closed");
    }
}
