//! Socket handles and the BSD-style verb set.
//!
//! A [`SocketHandle`] owns exactly one native socket and tracks its role:
//!
//! ```text
//! Unbound ──listen──▶ Listening ──┐
//!    │                            ├──close──▶ Closed
//!    └──────connect──▶ Connected ─┘
//! ```
//!
//! All verbs take `&self` so a handle can be shared between the worker that
//! blocks on it and the manager that tears it down. Blocking calls are
//! released by [`SocketHandle::shutdown`]; after that they return
//! [`SocketError::Interrupted`]. [`SocketHandle::close`] releases the native
//! socket once; a blocking call still in flight keeps it alive until it
//! returns, so the descriptor is never reused underneath it.

use std::io::{self, Read};
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use socket2::{Domain, Protocol as NativeProtocol, SockAddr, Socket, Type};

use crate::net::buffer::{send_descriptor, MessageBuffer};
use crate::net::endpoint::{AddressFamily, Endpoint};
use crate::net::error::{SocketError, SocketResult};

/// Socket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    /// Stream socket (TCP)
    Stream,
    /// Datagram socket (UDP)
    Datagram,
}

impl From<SocketType> for Type {
    fn from(ty: SocketType) -> Self {
        match ty {
            SocketType::Stream => Type::STREAM,
            SocketType::Datagram => Type::DGRAM,
        }
    }
}

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl From<Protocol> for NativeProtocol {
    fn from(proto: Protocol) -> Self {
        match proto {
            Protocol::Tcp => NativeProtocol::TCP,
            Protocol::Udp => NativeProtocol::UDP,
        }
    }
}

/// Position of a handle in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Role {
    Unbound = 0,
    Listening = 1,
    Connected = 2,
    Closed = 3,
}

impl Role {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Role::Unbound,
            1 => Role::Listening,
            2 => Role::Connected,
            _ => Role::Closed,
        }
    }
}

/// Options accepted by [`SocketHandle::set_option`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// Allow rebinding the address immediately after close (`SO_REUSEADDR`).
    ReuseAddress(bool),
    /// Bound how long a receive may block; `None` blocks indefinitely.
    ReceiveTimeout(Option<Duration>),
    /// Disable Nagle's algorithm. Stream sockets only.
    NoDelay(bool),
}

impl SocketOption {
    fn name(&self) -> &'static str {
        match self {
            SocketOption::ReuseAddress(_) => "reuse-address",
            SocketOption::ReceiveTimeout(_) => "receive-timeout",
            SocketOption::NoDelay(_) => "no-delay",
        }
    }
}

const SHUT_READ: u8 = 0b01;
const SHUT_WRITE: u8 = 0b10;

fn shutdown_bits(how: Shutdown) -> u8 {
    match how {
        Shutdown::Read => SHUT_READ,
        Shutdown::Write => SHUT_WRITE,
        Shutdown::Both => SHUT_READ | SHUT_WRITE,
    }
}

fn shutdown_direction(bits: u8) -> Shutdown {
    match bits {
        SHUT_READ => Shutdown::Read,
        SHUT_WRITE => Shutdown::Write,
        _ => Shutdown::Both,
    }
}

/// An exclusively-owned native socket with a role tag.
pub struct SocketHandle {
    /// `None` once closed.
    socket: ArcSwapOption<Socket>,
    role: AtomicU8,
    bound: AtomicBool,
    shutdown: AtomicU8,
    family: AddressFamily,
    socket_type: SocketType,
}

impl SocketHandle {
    /// Create an unbound blocking socket.
    pub fn create(
        family: AddressFamily,
        socket_type: SocketType,
        protocol: Option<Protocol>,
    ) -> SocketResult<Self> {
        let domain: Domain = family.into();
        let socket = Socket::new(domain, socket_type.into(), protocol.map(Into::into))
            .map_err(SocketError::Resource)?;

        tracing::trace!(?family, ?socket_type, "Socket created");

        Ok(Self::from_native(socket, family, socket_type, Role::Unbound))
    }

    /// Create a TCP stream socket.
    pub fn tcp(family: AddressFamily) -> SocketResult<Self> {
        Self::create(family, SocketType::Stream, Some(Protocol::Tcp))
    }

    /// Create a UDP datagram socket.
    pub fn udp(family: AddressFamily) -> SocketResult<Self> {
        Self::create(family, SocketType::Datagram, Some(Protocol::Udp))
    }

    fn from_native(socket: Socket, family: AddressFamily, socket_type: SocketType, role: Role) -> Self {
        Self {
            socket: ArcSwapOption::from(Some(Arc::new(socket))),
            role: AtomicU8::new(role as u8),
            bound: AtomicBool::new(false),
            shutdown: AtomicU8::new(0),
            family,
            socket_type,
        }
    }

    pub fn role(&self) -> Role {
        Role::from_u8(self.role.load(Ordering::Acquire))
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    pub fn is_closed(&self) -> bool {
        self.role() == Role::Closed
    }

    /// Whether the receive side has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire) & SHUT_READ != 0
    }

    /// Assign a local address. The role stays `Unbound`.
    pub fn bind(&self, endpoint: &Endpoint) -> SocketResult<()> {
        let socket = self.live()?;
        if self.role() != Role::Unbound {
            return Err(SocketError::Bind(SocketError::invalid_role("socket is not unbound")));
        }

        let addr: SockAddr = endpoint.into();
        socket.bind(&addr).map_err(SocketError::Bind)?;
        self.bound.store(true, Ordering::Release);

        tracing::debug!(address = %endpoint, "Socket bound");
        Ok(())
    }

    /// Start accepting connections on a bound stream socket.
    pub fn listen(&self, backlog: i32) -> SocketResult<()> {
        let socket = self.live()?;
        if self.socket_type != SocketType::Stream {
            return Err(SocketError::Listen(SocketError::invalid_role("not a stream socket")));
        }
        if !self.bound.load(Ordering::Acquire) {
            return Err(SocketError::Listen(SocketError::invalid_role("socket is not bound")));
        }

        socket.listen(backlog).map_err(SocketError::Listen)?;
        if !self.advance(Role::Listening) {
            return Err(SocketError::Listen(SocketError::invalid_role("socket is not unbound")));
        }

        tracing::debug!(backlog, "Socket listening");
        Ok(())
    }

    /// Connect to a remote endpoint, blocking until the transport answers.
    pub fn connect(&self, endpoint: &Endpoint) -> SocketResult<()> {
        self.connect_with(endpoint, None)
    }

    /// Connect, giving up with `Connect(TimedOut)` after `timeout`.
    pub fn connect_timeout(&self, endpoint: &Endpoint, timeout: Duration) -> SocketResult<()> {
        self.connect_with(endpoint, Some(timeout))
    }

    fn connect_with(&self, endpoint: &Endpoint, timeout: Option<Duration>) -> SocketResult<()> {
        let socket = self.live()?;
        if self.role() != Role::Unbound {
            return Err(SocketError::Connect(SocketError::invalid_role("socket is not unbound")));
        }

        if self.shutdown.load(Ordering::Acquire) != 0 {
            return Err(SocketError::Interrupted);
        }

        let addr: SockAddr = endpoint.into();
        match timeout {
            Some(timeout) => socket.connect_timeout(&addr, timeout),
            None => socket.connect(&addr),
        }
        .map_err(|e| {
            if self.shutdown.load(Ordering::Acquire) != 0 {
                SocketError::Interrupted
            } else {
                SocketError::Connect(e)
            }
        })?;

        if !self.advance(Role::Connected) {
            return Err(SocketError::Connect(SocketError::invalid_role("socket is not unbound")));
        }

        tracing::debug!(peer = %endpoint, "Socket connected");
        Ok(())
    }

    /// Wait for a peer and return the connection with its remote endpoint.
    ///
    /// Returns `Interrupted` once the listener has been shut down; the
    /// listener keeps its role.
    pub fn accept(&self) -> SocketResult<(SocketHandle, Endpoint)> {
        let socket = self.live()?;
        if self.role() != Role::Listening {
            return Err(SocketError::Accept(SocketError::invalid_role("socket is not listening")));
        }
        if self.is_shut_down() {
            return Err(SocketError::Interrupted);
        }

        let (conn, addr) = socket
            .accept()
            .map_err(|e| self.steady_error(e, SHUT_READ, SocketError::Accept))?;

        let peer = Endpoint::from_sock_addr(&addr).ok_or_else(|| {
            SocketError::Accept(io::Error::new(io::ErrorKind::InvalidData, "peer is not an IP endpoint"))
        })?;

        let handle = Self::from_native(conn, self.family, self.socket_type, Role::Connected);
        handle.bound.store(true, Ordering::Release);

        tracing::trace!(peer = %peer, "Connection accepted");
        Ok((handle, peer))
    }

    /// Send on a connected socket. Returns the number of bytes the transport
    /// took, which may be less than `bytes.len()`.
    pub fn send(&self, bytes: &[u8]) -> SocketResult<usize> {
        let socket = self.live()?;
        if self.role() != Role::Connected {
            return Err(SocketError::Io(SocketError::invalid_role("socket is not connected")));
        }

        socket
            .send_vectored(&send_descriptor(bytes))
            .map_err(|e| self.steady_error(e, SHUT_WRITE, SocketError::Io))
    }

    /// Send a datagram to `endpoint`.
    pub fn send_to(&self, bytes: &[u8], endpoint: &Endpoint) -> SocketResult<usize> {
        let socket = self.live()?;
        let addr: SockAddr = endpoint.into();

        socket
            .send_to_vectored(&send_descriptor(bytes), &addr)
            .map_err(|e| self.steady_error(e, SHUT_WRITE, SocketError::Io))
    }

    /// Receive into `buf` from a connected socket.
    ///
    /// `Ok(0)` on a stream socket means the peer closed its side.
    pub fn recv(&self, buf: &mut MessageBuffer) -> SocketResult<usize> {
        let socket = self.live()?;
        if self.role() != Role::Connected {
            return Err(SocketError::Io(SocketError::invalid_role("socket is not connected")));
        }
        if self.is_shut_down() {
            return Err(SocketError::Interrupted);
        }

        let result = {
            let mut desc = buf.read_descriptor();
            (&*socket).read_vectored(&mut desc)
        };
        let received = result.map_err(|e| self.steady_error(e, SHUT_READ, SocketError::Io))?;

        // A receive released by our own shutdown also reports zero bytes.
        if received == 0 && self.is_shut_down() {
            return Err(SocketError::Interrupted);
        }

        buf.commit(received);
        Ok(buf.len())
    }

    /// Receive one datagram into `buf` and report its sender.
    pub fn recv_from(&self, buf: &mut MessageBuffer) -> SocketResult<(usize, Endpoint)> {
        let socket = self.live()?;
        if self.is_shut_down() {
            return Err(SocketError::Interrupted);
        }

        let result = {
            let mut desc = buf.recv_descriptor();
            socket.recv_from_vectored(&mut desc)
        };
        let (received, _flags, addr) =
            result.map_err(|e| self.steady_error(e, SHUT_READ, SocketError::Io))?;

        if self.is_shut_down() {
            return Err(SocketError::Interrupted);
        }

        let sender = Endpoint::from_sock_addr(&addr).ok_or_else(|| {
            SocketError::Io(io::Error::new(io::ErrorKind::InvalidData, "sender is not an IP endpoint"))
        })?;

        buf.commit(received);
        Ok((buf.len(), sender))
    }

    /// Apply a socket option. Failures are reported but never fatal to the handle.
    pub fn set_option(&self, option: SocketOption) -> SocketResult<()> {
        let socket = self.live()?;
        let rejected = |e: io::Error| SocketError::Option {
            option: option.name(),
            reason: e.to_string(),
        };

        match option {
            SocketOption::ReuseAddress(reuse) => socket.set_reuse_address(reuse).map_err(rejected),
            SocketOption::ReceiveTimeout(timeout) => socket.set_read_timeout(timeout).map_err(rejected),
            SocketOption::NoDelay(nodelay) => {
                if self.socket_type != SocketType::Stream {
                    return Err(SocketError::Option {
                        option: option.name(),
                        reason: "not a stream socket".into(),
                    });
                }
                socket.set_nodelay(nodelay).map_err(rejected)
            }
        }
    }

    /// Stop reads, writes, or both, releasing any call blocked on them.
    ///
    /// Repeating a direction already shut down is a no-op, as is shutting
    /// down a closed handle. Native failures (e.g. "not connected" on an
    /// unconnected datagram socket, which still wakes blocked readers) are
    /// only logged.
    pub fn shutdown(&self, how: Shutdown) {
        let requested = shutdown_bits(how);
        let previous = self.shutdown.fetch_or(requested, Ordering::AcqRel);
        let fresh = requested & !previous;
        if fresh == 0 {
            return;
        }

        let Some(socket) = self.socket.load_full() else {
            return;
        };

        match socket.shutdown(shutdown_direction(fresh)) {
            Ok(()) => tracing::debug!(direction = ?shutdown_direction(fresh), "Socket shut down"),
            Err(e) => tracing::debug!(
                direction = ?shutdown_direction(fresh),
                error = %e,
                "Native shutdown reported an error"
            ),
        }
    }

    /// Release the native socket. Closing again is a no-op.
    pub fn close(&self) {
        let released = self.socket.swap(None);
        self.role.store(Role::Closed as u8, Ordering::Release);

        if released.is_some() {
            tracing::trace!(socket_type = ?self.socket_type, "Socket closed");
        }
    }

    pub fn local_endpoint(&self) -> SocketResult<Endpoint> {
        let socket = self.live()?;
        let addr = socket.local_addr().map_err(SocketError::Io)?;
        Endpoint::from_sock_addr(&addr).ok_or_else(|| {
            SocketError::Io(io::Error::new(io::ErrorKind::InvalidData, "local address is not an IP endpoint"))
        })
    }

    pub fn peer_endpoint(&self) -> SocketResult<Endpoint> {
        let socket = self.live()?;
        let addr = socket.peer_addr().map_err(SocketError::Io)?;
        Endpoint::from_sock_addr(&addr).ok_or_else(|| {
            SocketError::Io(io::Error::new(io::ErrorKind::InvalidData, "peer address is not an IP endpoint"))
        })
    }

    fn live(&self) -> SocketResult<Arc<Socket>> {
        self.socket.load_full().ok_or(SocketError::Closed)
    }

    /// Move from `Unbound` to `to`. Fails if the handle already left `Unbound`.
    fn advance(&self, to: Role) -> bool {
        self.role
            .compare_exchange(Role::Unbound as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Classify a failure of a blocking call.
    fn steady_error(&self, err: io::Error, side: u8, wrap: fn(io::Error) -> SocketError) -> SocketError {
        if self.shutdown.load(Ordering::Acquire) & side != 0 || self.is_closed() {
            return SocketError::Interrupted;
        }
        match err.kind() {
            io::ErrorKind::Interrupted => SocketError::Interrupted,
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SocketError::TimedOut,
            _ => wrap(err),
        }
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("role", &self.role())
            .field("family", &self.family)
            .field("socket_type", &self.socket_type)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
