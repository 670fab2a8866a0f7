//! Socket error taxonomy.
//!
//! Errors are grouped by the phase they occur in:
//! - setup (`Resource`, `Bind`, `Listen`, `Connect`): fatal, reported to the loader
//! - steady state (`Accept`, `Io`, `TimedOut`, and `Resource` for per-iteration
//!   buffers): recoverable inside a worker loop
//! - `Interrupted`: the expected outcome of a deliberate `shutdown`

use std::io;

use thiserror::Error;

/// Errors produced by the socket verb set.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Native socket or buffer allocation failed.
    #[error("resource allocation failed: {0}")]
    Resource(#[source] io::Error),

    /// Binding to a local endpoint failed.
    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),

    /// Switching to the listening role failed.
    #[error("listen failed: {0}")]
    Listen(#[source] io::Error),

    /// Connecting to a remote endpoint failed (refused, unreachable, timed out).
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// Accepting a pending connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// A send or receive failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// A receive timeout configured on the handle expired.
    #[error("receive timed out")]
    TimedOut,

    /// A blocking call was released by `shutdown` or a signal.
    #[error("operation interrupted")]
    Interrupted,

    /// The requested socket option is unsupported or was rejected.
    #[error("socket option {option} rejected: {reason}")]
    Option { option: &'static str, reason: String },

    /// The handle has already been closed.
    #[error("socket is closed")]
    Closed,
}

impl SocketError {
    /// Setup-phase failures are never retried.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            SocketError::Resource(_)
                | SocketError::Bind(_)
                | SocketError::Listen(_)
                | SocketError::Connect(_)
        )
    }

    /// Steady-state failures a worker loop retries after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SocketError::Accept(_) | SocketError::Io(_) | SocketError::Resource(_)
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SocketError::Interrupted)
    }

    pub(crate) fn invalid_role(what: &str) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, what.to_string())
    }
}

/// Result type for socket operations.
pub type SocketResult<T> = Result<T, SocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let refused = || io::Error::from(io::ErrorKind::ConnectionRefused);

        assert!(SocketError::Bind(refused()).is_setup());
        assert!(SocketError::Connect(refused()).is_setup());
        assert!(!SocketError::Accept(refused()).is_setup());

        assert!(SocketError::Accept(refused()).is_transient());
        assert!(SocketError::Io(refused()).is_transient());
        assert!(SocketError::Resource(io::Error::from(io::ErrorKind::OutOfMemory)).is_transient());
        assert!(!SocketError::TimedOut.is_transient());
        assert!(!SocketError::Interrupted.is_transient());
        assert!(!SocketError::Closed.is_transient());

        assert!(SocketError::Interrupted.is_interrupted());
    }

    #[test]
    fn display_includes_cause() {
        let err = SocketError::Bind(io::Error::from(io::ErrorKind::AddrInUse));
        assert!(err.to_string().starts_with("bind failed"));

        let err = SocketError::Option {
            option: "linger",
            reason: "unsupported".into(),
        };
        assert_eq!(err.to_string(), "socket option linger rejected: unsupported");
    }
}
