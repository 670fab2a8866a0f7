//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Caller
//!     → socket.rs (verb set: create/bind/listen/accept/connect/send/recv/...)
//!     → buffer.rs (flat buffer ⇄ single vectored descriptor)
//!     → socket2 (native blocking socket)
//!
//! accept()
//!     → connection.rs (per-connection handle, closed on drop)
//!
//! Handle roles:
//!     Unbound → Listening | Connected → Closed
//! ```
//!
//! # Design Decisions
//! - Every verb is blocking; cancellation is done by shutting the transport down
//! - Handles are shareable (`&self` verbs) so teardown can reach a blocked worker
//! - Close is idempotent and releases the native socket exactly once

pub mod buffer;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod socket;

pub use buffer::MessageBuffer;
pub use connection::{Connection, ConnectionId};
pub use endpoint::{AddressFamily, Endpoint};
pub use error::{SocketError, SocketResult};
pub use socket::{Protocol, Role, SocketHandle, SocketOption, SocketType};
pub use std::net::Shutdown;
