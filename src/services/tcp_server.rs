//! Stream server: one message per accepted connection.

use std::time::Duration;

use crate::config::validation::parse_endpoint;
use crate::config::{TcpServerConfig, ValidationError};
use crate::lifecycle::{ConnectionSlot, Flow, Service};
use crate::net::{
    Connection, Endpoint, MessageBuffer, SocketError, SocketHandle, SocketOption, SocketResult,
};
use crate::observability::metrics;
use crate::services::{deliver, MessageSink};

const NAME: &str = "tcp-server";

#[derive(Debug, Clone)]
pub struct TcpServer {
    bind: Endpoint,
    backlog: i32,
    buffer_size: usize,
    reuse_address: bool,
    reply: Option<String>,
    connection_timeout: Duration,
    sink: Option<MessageSink>,
    slot: Option<ConnectionSlot>,
}

impl TcpServer {
    pub fn new(bind: Endpoint) -> Self {
        let defaults = TcpServerConfig::default();
        Self {
            bind,
            backlog: defaults.backlog,
            buffer_size: defaults.recv_buffer_size,
            reuse_address: defaults.reuse_address,
            reply: None,
            connection_timeout: defaults.connection_timeout(),
            sink: None,
            slot: None,
        }
    }

    pub fn from_config(config: &TcpServerConfig) -> Result<Self, ValidationError> {
        let bind = parse_endpoint("tcp_server.bind_address", &config.bind_address)?;
        Ok(Self {
            backlog: config.backlog,
            buffer_size: config.recv_buffer_size,
            reuse_address: config.reuse_address,
            reply: config.reply.clone(),
            connection_timeout: config.connection_timeout(),
            ..Self::new(bind)
        })
    }

    /// Send `reply` back after each received message.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Bound how long an accepted connection may stay silent.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Forward every received message to `sink`.
    pub fn with_sink(mut self, sink: MessageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn handle_connection(&self, conn: &Connection) {
        let socket = conn.handle();

        if let Err(e) = socket.set_option(SocketOption::ReceiveTimeout(Some(self.connection_timeout))) {
            tracing::debug!(connection_id = %conn.id(), error = %e, "Receive timeout not applied");
        }

        let mut buf = match MessageBuffer::with_capacity(self.buffer_size) {
            Ok(buf) => buf,
            Err(e) => {
                tracing::warn!(connection_id = %conn.id(), error = %e, "Dropping connection");
                return;
            }
        };

        match socket.recv(&mut buf) {
            Ok(0) => {
                tracing::debug!(connection_id = %conn.id(), peer = %conn.peer(), "Peer closed without data");
            }
            Ok(received) => {
                tracing::info!(
                    connection_id = %conn.id(),
                    peer = %conn.peer(),
                    bytes = received,
                    text = %buf.to_string_lossy(),
                    "Received message"
                );
                metrics::record_bytes_received(NAME, received);
                deliver(&self.sink, conn.peer(), buf.as_bytes());

                if let Some(reply) = &self.reply {
                    self.send_reply(conn, reply.as_bytes());
                }
            }
            Err(SocketError::TimedOut) => {
                tracing::warn!(connection_id = %conn.id(), peer = %conn.peer(), "Peer sent nothing in time");
            }
            Err(SocketError::Interrupted) => {
                tracing::debug!(connection_id = %conn.id(), "Connection released for shutdown");
            }
            Err(e) => {
                tracing::warn!(connection_id = %conn.id(), peer = %conn.peer(), error = %e, "Receive failed");
            }
        }
    }

    fn send_reply(&self, conn: &Connection, reply: &[u8]) {
        match conn.handle().send(reply) {
            Ok(sent) if sent < reply.len() => {
                metrics::record_bytes_sent(NAME, sent);
                tracing::warn!(
                    connection_id = %conn.id(),
                    sent,
                    requested = reply.len(),
                    "Reply partially sent"
                );
            }
            Ok(sent) => metrics::record_bytes_sent(NAME, sent),
            Err(e) => {
                tracing::warn!(connection_id = %conn.id(), error = %e, "Reply failed");
            }
        }
    }
}

impl Service for TcpServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self) -> SocketResult<SocketHandle> {
        let socket = SocketHandle::tcp(self.bind.family())?;
        if self.reuse_address {
            if let Err(e) = socket.set_option(SocketOption::ReuseAddress(true)) {
                tracing::warn!(error = %e, "Address reuse not enabled");
            }
        }
        Ok(socket)
    }

    fn establish(&mut self, socket: &SocketHandle) -> SocketResult<()> {
        socket.bind(&self.bind)?;
        socket.listen(self.backlog)?;

        tracing::info!(address = %socket.local_endpoint()?, backlog = self.backlog, "TCP server listening");
        Ok(())
    }

    fn serve(&mut self, socket: &SocketHandle) -> SocketResult<Flow> {
        let (handle, peer) = socket.accept()?;
        let conn = Connection::new(handle, peer);
        metrics::record_connection_accepted(NAME);
        tracing::debug!(connection_id = %conn.id(), peer = %peer, "Connection accepted");

        let _tracked = self.slot.as_ref().map(|slot| slot.track(conn.shared_handle()));
        self.handle_connection(&conn);
        Ok(Flow::Continue)
    }

    fn attach(&mut self, slot: ConnectionSlot) {
        self.slot = Some(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::AddressFamily;

    #[test]
    fn from_config_copies_fields() {
        let config = TcpServerConfig {
            bind_address: "127.0.0.1:0".into(),
            backlog: 9,
            recv_buffer_size: 64,
            reuse_address: false,
            reply: Some("ok".into()),
            connection_timeout_secs: 7,
        };
        let server = TcpServer::from_config(&config).unwrap();
        assert_eq!(server.backlog, 9);
        assert_eq!(server.buffer_size, 64);
        assert!(!server.reuse_address);
        assert_eq!(server.reply.as_deref(), Some("ok"));
        assert_eq!(server.connection_timeout, Duration::from_secs(7));
    }

    #[test]
    fn serve_handles_one_connection() {
        let mut server = TcpServer::new(Endpoint::localhost(0)).with_reply("ack");
        let listener = server.open().unwrap();
        server.establish(&listener).unwrap();
        let addr = listener.local_endpoint().unwrap();

        let client = std::thread::spawn(move || {
            let sock = SocketHandle::tcp(AddressFamily::Ipv4).unwrap();
            sock.connect(&addr).unwrap();
            sock.send(b"hi").unwrap();
            let mut buf = MessageBuffer::with_capacity(16).unwrap();
            sock.recv(&mut buf).unwrap();
            buf.to_string_lossy()
        });

        assert_eq!(server.serve(&listener).unwrap(), Flow::Continue);
        assert_eq!(client.join().unwrap(), "ack");
    }
}
