//! Datagram server: acknowledge every datagram to its sender.

use std::time::Duration;

use crate::config::validation::parse_endpoint;
use crate::config::{UdpServerConfig, ValidationError};
use crate::lifecycle::{Flow, Service};
use crate::net::{Endpoint, MessageBuffer, SocketHandle, SocketOption, SocketResult};
use crate::observability::metrics;
use crate::services::{deliver, MessageSink};

const NAME: &str = "udp-server";

#[derive(Debug, Clone)]
pub struct UdpServer {
    bind: Endpoint,
    reply: Vec<u8>,
    buffer_size: usize,
    recv_timeout: Duration,
    /// Reused across iterations; allocated on first use.
    buffer: Option<MessageBuffer>,
    sink: Option<MessageSink>,
}

impl UdpServer {
    pub fn new(bind: Endpoint) -> Self {
        let defaults = UdpServerConfig::default();
        Self {
            bind,
            reply: defaults.reply.clone().into_bytes(),
            buffer_size: defaults.recv_buffer_size,
            recv_timeout: defaults.recv_timeout(),
            buffer: None,
            sink: None,
        }
    }

    pub fn from_config(config: &UdpServerConfig) -> Result<Self, ValidationError> {
        let bind = parse_endpoint("udp_server.bind_address", &config.bind_address)?;
        Ok(Self {
            reply: config.reply.clone().into_bytes(),
            buffer_size: config.recv_buffer_size,
            recv_timeout: config.recv_timeout(),
            ..Self::new(bind)
        })
    }

    pub fn with_reply(mut self, reply: impl Into<Vec<u8>>) -> Self {
        self.reply = reply.into();
        self
    }

    pub fn with_sink(mut self, sink: MessageSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl Service for UdpServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self) -> SocketResult<SocketHandle> {
        let socket = SocketHandle::udp(self.bind.family())?;
        if let Err(e) = socket.set_option(SocketOption::ReceiveTimeout(Some(self.recv_timeout))) {
            tracing::warn!(error = %e, "Receive timeout not applied");
        }
        Ok(socket)
    }

    fn establish(&mut self, socket: &SocketHandle) -> SocketResult<()> {
        socket.bind(&self.bind)?;
        tracing::info!(address = %socket.local_endpoint()?, "UDP server listening");
        Ok(())
    }

    fn serve(&mut self, socket: &SocketHandle) -> SocketResult<Flow> {
        // Allocation failure is transient: the worker backs off before the next try.
        let buf = match self.buffer.take() {
            Some(buf) => self.buffer.insert(buf),
            None => self.buffer.insert(MessageBuffer::with_capacity(self.buffer_size)?),
        };

        let (received, sender) = socket.recv_from(buf)?;
        if received == 0 {
            return Ok(Flow::Continue);
        }

        metrics::record_bytes_received(NAME, received);
        tracing::info!(peer = %sender, bytes = received, text = %buf.to_string_lossy(), "Received datagram");
        deliver(&self.sink, sender, buf.as_bytes());

        match socket.send_to(&self.reply, &sender) {
            Ok(sent) => metrics::record_bytes_sent(NAME, sent),
            Err(e) => tracing::warn!(peer = %sender, error = %e, "Acknowledgement failed"),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{AddressFamily, SocketError};

    #[test]
    fn buffer_is_reused_between_iterations() {
        let mut server = UdpServer::new(Endpoint::localhost(0));
        let socket = server.open().unwrap();
        server.establish(&socket).unwrap();
        let addr = socket.local_endpoint().unwrap();

        let client = SocketHandle::udp(AddressFamily::Ipv4).unwrap();
        client.send_to(b"longer message", &addr).unwrap();
        client.send_to(b"short", &addr).unwrap();

        server.serve(&socket).unwrap();
        server.serve(&socket).unwrap();

        // The second, shorter datagram must not expose the tail of the first.
        let buf = server.buffer.as_ref().unwrap();
        assert_eq!(buf.as_bytes(), b"short");
    }

    #[test]
    fn unallocatable_buffer_is_a_transient_error() {
        let mut server = UdpServer::new(Endpoint::localhost(0));
        server.buffer_size = usize::MAX;
        let socket = server.open().unwrap();
        server.establish(&socket).unwrap();

        let err = server.serve(&socket).unwrap_err();
        assert!(matches!(err, SocketError::Resource(_)));
        assert!(err.is_transient());
        assert!(server.buffer.is_none());
    }
}
