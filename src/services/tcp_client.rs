//! Stream client: connect, send one message, optionally read one reply, exit.

use std::time::Duration;

use crate::config::validation::parse_endpoint;
use crate::config::{TcpClientConfig, ValidationError};
use crate::lifecycle::{Flow, Service};
use crate::net::{Endpoint, MessageBuffer, SocketError, SocketHandle, SocketOption, SocketResult};
use crate::observability::metrics;
use crate::services::{deliver, MessageSink};

const NAME: &str = "tcp-client";

#[derive(Debug, Clone)]
pub struct TcpClient {
    server: Endpoint,
    message: Vec<u8>,
    connect_timeout: Duration,
    reply_timeout: Option<Duration>,
    buffer_size: usize,
    sink: Option<MessageSink>,
}

impl TcpClient {
    pub fn new(server: Endpoint, message: impl Into<Vec<u8>>) -> Self {
        let defaults = TcpClientConfig::default();
        Self {
            server,
            message: message.into(),
            connect_timeout: defaults.connect_timeout(),
            reply_timeout: None,
            buffer_size: defaults.recv_buffer_size,
            sink: None,
        }
    }

    pub fn from_config(config: &TcpClientConfig) -> Result<Self, ValidationError> {
        let server = parse_endpoint("tcp_client.server_address", &config.server_address)?;
        Ok(Self {
            connect_timeout: config.connect_timeout(),
            reply_timeout: config.await_reply.then(|| config.recv_timeout()),
            buffer_size: config.recv_buffer_size,
            ..Self::new(server, config.message.clone())
        })
    }

    /// Wait up to `timeout` for one reply after sending.
    pub fn expect_reply(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    pub fn with_sink(mut self, sink: MessageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn exchange(&self, socket: &SocketHandle) -> SocketResult<()> {
        let sent = socket.send(&self.message)?;
        metrics::record_bytes_sent(NAME, sent);
        if sent < self.message.len() {
            tracing::warn!(sent, requested = self.message.len(), "Message partially sent");
        } else {
            tracing::info!(
                server = %self.server,
                text = %String::from_utf8_lossy(&self.message),
                "Sent message"
            );
        }

        if self.reply_timeout.is_none() {
            return Ok(());
        }

        let mut buf = MessageBuffer::with_capacity(self.buffer_size)?;
        match socket.recv(&mut buf)? {
            0 => tracing::info!(server = %self.server, "Server closed without replying"),
            received => {
                metrics::record_bytes_received(NAME, received);
                tracing::info!(server = %self.server, text = %buf.to_string_lossy(), "Received reply");
                deliver(&self.sink, self.server, buf.as_bytes());
            }
        }
        Ok(())
    }
}

impl Service for TcpClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self) -> SocketResult<SocketHandle> {
        let socket = SocketHandle::tcp(self.server.family())?;
        if let Some(timeout) = self.reply_timeout {
            if let Err(e) = socket.set_option(SocketOption::ReceiveTimeout(Some(timeout))) {
                tracing::warn!(error = %e, "Reply timeout not applied");
            }
        }
        Ok(socket)
    }

    fn establish(&mut self, socket: &SocketHandle) -> SocketResult<()> {
        socket.connect_timeout(&self.server, self.connect_timeout)?;
        tracing::info!(server = %self.server, "Connected");
        Ok(())
    }

    /// One exchange, then finish. Failures end the client instead of being retried.
    fn serve(&mut self, socket: &SocketHandle) -> SocketResult<Flow> {
        match self.exchange(socket) {
            Ok(()) => {}
            Err(SocketError::TimedOut) => {
                tracing::warn!(server = %self.server, "No reply from server (timeout)");
            }
            Err(SocketError::Interrupted) => return Err(SocketError::Interrupted),
            Err(e) => {
                tracing::error!(server = %self.server, error = %e, "Exchange failed");
            }
        }
        Ok(Flow::Finished)
    }
}
