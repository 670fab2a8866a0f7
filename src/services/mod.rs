//! Demonstration service modules.
//!
//! # Modules
//! ```text
//! tcp_server  bind + listen, then accept → recv one message → optional reply → close
//! tcp_client  connect, send one message (optionally wait for a reply), exit
//! udp_server  bind, then recv_from → reply to the sender, forever
//! udp_client  send_to the server, wait for one reply within a timeout, exit
//! ```
//!
//! Payloads are opaque bytes. Received messages are logged and, when a
//! sink is attached, forwarded to it so callers can observe traffic.

pub mod tcp_client;
pub mod tcp_server;
pub mod udp_client;
pub mod udp_server;

use std::fmt;
use std::sync::mpsc::Sender;

use crate::config::{KsockConfig, ValidationError};
use crate::lifecycle::{Module, ServiceModule};
use crate::net::Endpoint;

pub use tcp_client::TcpClient;
pub use tcp_server::TcpServer;
pub use udp_client::UdpClient;
pub use udp_server::UdpServer;

/// A payload received by a service, with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub peer: Endpoint,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Where services forward what they receive.
pub type MessageSink = Sender<Message>;

fn deliver(sink: &Option<MessageSink>, peer: Endpoint, payload: &[u8]) {
    if let Some(sink) = sink {
        // A dropped receiver only means nobody is watching any more.
        let _ = sink.send(Message {
            peer,
            payload: payload.to_vec(),
        });
    }
}

/// The modules the host knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    TcpServer,
    TcpClient,
    UdpServer,
    UdpClient,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::TcpServer => "tcp-server",
            ModuleKind::TcpClient => "tcp-client",
            ModuleKind::UdpServer => "udp-server",
            ModuleKind::UdpClient => "udp-client",
        };
        f.write_str(name)
    }
}

/// Build a loadable module of `kind` from its configuration section.
pub fn build_module(kind: ModuleKind, config: &KsockConfig) -> Result<Box<dyn Module>, ValidationError> {
    let worker = config.worker.clone();
    let module: Box<dyn Module> = match kind {
        ModuleKind::TcpServer => Box::new(ServiceModule::new(
            TcpServer::from_config(&config.tcp_server)?,
            worker,
        )),
        ModuleKind::TcpClient => Box::new(ServiceModule::new(
            TcpClient::from_config(&config.tcp_client)?,
            worker,
        )),
        ModuleKind::UdpServer => Box::new(ServiceModule::new(
            UdpServer::from_config(&config.udp_server)?,
            worker,
        )),
        ModuleKind::UdpClient => Box::new(ServiceModule::new(
            UdpClient::from_config(&config.udp_client)?,
            worker,
        )),
    };
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn builds_every_kind_from_defaults() {
        let config = KsockConfig::default();
        for kind in [
            ModuleKind::TcpServer,
            ModuleKind::TcpClient,
            ModuleKind::UdpServer,
            ModuleKind::UdpClient,
        ] {
            let module = build_module(kind, &config).unwrap();
            assert_eq!(module.name(), kind.to_string());
            assert!(!module.is_active());
        }
    }

    #[test]
    fn bad_address_is_rejected() {
        let mut config = KsockConfig::default();
        config.udp_client.server_address = "nope".into();
        assert!(build_module(ModuleKind::UdpClient, &config).is_err());
    }

    #[test]
    fn deliver_tolerates_missing_or_closed_sink() {
        deliver(&None, Endpoint::localhost(1), b"x");

        let (tx, rx) = mpsc::channel();
        drop(rx);
        deliver(&Some(tx), Endpoint::localhost(1), b"x");
    }
}
