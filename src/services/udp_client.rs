//! Datagram client: send once, wait for one acknowledgement, exit.

use std::time::Duration;

use crate::config::validation::parse_endpoint;
use crate::config::{UdpClientConfig, ValidationError};
use crate::lifecycle::{Flow, Service};
use crate::net::{Endpoint, MessageBuffer, SocketError, SocketHandle, SocketOption, SocketResult};
use crate::observability::metrics;
use crate::services::{deliver, MessageSink};

const NAME: &str = "udp-client";

#[derive(Debug, Clone)]
pub struct UdpClient {
    server: Endpoint,
    message: Vec<u8>,
    recv_timeout: Duration,
    buffer_size: usize,
    sink: Option<MessageSink>,
}

impl UdpClient {
    pub fn new(server: Endpoint, message: impl Into<Vec<u8>>) -> Self {
        let defaults = UdpClientConfig::default();
        Self {
            server,
            message: message.into(),
            recv_timeout: defaults.recv_timeout(),
            buffer_size: defaults.recv_buffer_size,
            sink: None,
        }
    }

    pub fn from_config(config: &UdpClientConfig) -> Result<Self, ValidationError> {
        let server = parse_endpoint("udp_client.server_address", &config.server_address)?;
        Ok(Self {
            recv_timeout: config.recv_timeout(),
            buffer_size: config.recv_buffer_size,
            ..Self::new(server, config.message.clone())
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: MessageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn exchange(&self, socket: &SocketHandle) -> SocketResult<()> {
        let sent = socket.send_to(&self.message, &self.server)?;
        metrics::record_bytes_sent(NAME, sent);
        tracing::info!(server = %self.server, text = %String::from_utf8_lossy(&self.message), "Sent datagram");

        let mut buf = MessageBuffer::with_capacity(self.buffer_size)?;
        let (received, sender) = socket.recv_from(&mut buf)?;
        metrics::record_bytes_received(NAME, received);
        tracing::info!(peer = %sender, text = %buf.to_string_lossy(), "Received reply");
        deliver(&self.sink, sender, buf.as_bytes());
        Ok(())
    }
}

impl Service for UdpClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self) -> SocketResult<SocketHandle> {
        let socket = SocketHandle::udp(self.server.family())?;
        if let Err(e) = socket.set_option(SocketOption::ReceiveTimeout(Some(self.recv_timeout))) {
            tracing::warn!(error = %e, "Receive timeout not applied");
        }
        Ok(socket)
    }

    fn establish(&mut self, socket: &SocketHandle) -> SocketResult<()> {
        let local = match self.server.family() {
            crate::net::AddressFamily::Ipv4 => Endpoint::any(0),
            crate::net::AddressFamily::Ipv6 => Endpoint::any_v6(0),
        };
        socket.bind(&local)
    }

    fn serve(&mut self, socket: &SocketHandle) -> SocketResult<Flow> {
        match self.exchange(socket) {
            Ok(()) => {}
            Err(SocketError::TimedOut) => {
                tracing::warn!(server = %self.server, "No response from server (timeout or unreachable)");
            }
            Err(SocketError::Interrupted) => return Err(SocketError::Interrupted),
            Err(e) => tracing::error!(server = %self.server, error = %e, "Exchange failed"),
        }
        Ok(Flow::Finished)
    }
}
