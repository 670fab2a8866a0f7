//! ksock host process (v1)
//!
//! Loads one socket service module, keeps it running on its own worker
//! thread, and unloads it on SIGINT/SIGTERM or when the worker finishes.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI + config file
//!         │
//!         ▼
//!   ┌────────────┐  on_load   ┌──────────────┐  spawn   ┌───────────────────┐
//!   │ ModuleHost │──────────▶│ ServiceModule │────────▶│ Worker thread      │
//!   │            │            │              │          │  open → establish  │
//!   │            │  on_unload │              │   stop   │  serve loop        │
//!   │            │──────────▶│              │────────▶│  (blocking socket) │
//!   └────────────┘            └──────────────┘          └───────────────────┘
//!         ▲                                                     │
//!         │ SIGINT / SIGTERM / worker finished                  ▼
//!   lifecycle::signals                              net::SocketHandle (socket2)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use ksock::config::{load_config, validate_config, ConfigError, KsockConfig};
use ksock::lifecycle::signals::shutdown_signal;
use ksock::lifecycle::ModuleHost;
use ksock::net::Endpoint;
use ksock::observability::{logging, metrics};
use ksock::services::{build_module, ModuleKind};

const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "ksock")]
#[command(about = "Run a socket service module until interrupted", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept connections and log one message from each
    TcpServer {
        #[arg(short, long)]
        port: Option<u16>,

        /// Text sent back after each message
        #[arg(long)]
        reply: Option<String>,
    },
    /// Connect, send one message, exit
    TcpClient {
        /// Server address, e.g. 127.0.0.1:12345
        #[arg(short, long)]
        server: Option<String>,

        #[arg(short, long)]
        message: Option<String>,

        /// Wait for one reply before exiting
        #[arg(long)]
        await_reply: bool,
    },
    /// Acknowledge every datagram
    UdpServer {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send one datagram and wait for the acknowledgement
    UdpClient {
        #[arg(short, long)]
        server: Option<String>,

        #[arg(short, long)]
        message: Option<String>,
    },
}

impl Commands {
    /// Fold command-line overrides into `config` and name the module to load.
    fn apply(self, config: &mut KsockConfig) -> ModuleKind {
        match self {
            Commands::TcpServer { port, reply } => {
                if let Some(port) = port {
                    config.tcp_server.bind_address = with_port(&config.tcp_server.bind_address, port);
                }
                if reply.is_some() {
                    config.tcp_server.reply = reply;
                }
                ModuleKind::TcpServer
            }
            Commands::TcpClient { server, message, await_reply } => {
                if let Some(server) = server {
                    config.tcp_client.server_address = server;
                }
                if let Some(message) = message {
                    config.tcp_client.message = message;
                }
                config.tcp_client.await_reply |= await_reply;
                ModuleKind::TcpClient
            }
            Commands::UdpServer { port } => {
                if let Some(port) = port {
                    config.udp_server.bind_address = with_port(&config.udp_server.bind_address, port);
                }
                ModuleKind::UdpServer
            }
            Commands::UdpClient { server, message } => {
                if let Some(server) = server {
                    config.udp_client.server_address = server;
                }
                if let Some(message) = message {
                    config.udp_client.message = message;
                }
                ModuleKind::UdpClient
            }
        }
    }
}

/// Replace the port of `address`; unparsable input is left for validation to report.
fn with_port(address: &str, port: u16) -> String {
    match Endpoint::parse(address) {
        Ok(endpoint) => Endpoint::new(endpoint.ip(), port).to_string(),
        Err(_) => address.to_string(),
    }
}

async fn wait_until_idle(host: &ModuleHost) {
    let mut interval = tokio::time::interval(IDLE_POLL);
    loop {
        interval.tick().await;
        if !host.any_active() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KsockConfig::default(),
    };
    let kind = cli.command.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(module = %kind, "ksock v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let module = build_module(kind, &config)?;
    let mut host = ModuleHost::new();
    // Loading waits on the worker's setup outcome.
    tokio::task::block_in_place(|| host.load(module))?;

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = wait_until_idle(&host) => tracing::info!(module = %kind, "Module finished"),
    }

    tokio::task::block_in_place(|| host.unload_all());
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_override_keeps_host() {
        assert_eq!(with_port("0.0.0.0:12345", 8080), "0.0.0.0:8080");
        assert_eq!(with_port("[::1]:1", 2), "[::1]:2");
        assert_eq!(with_port("garbage", 2), "garbage");
    }

    #[test]
    fn overrides_land_in_their_section() {
        let mut config = KsockConfig::default();
        let kind = Commands::UdpClient {
            server: Some("10.0.0.1:9".into()),
            message: None,
        }
        .apply(&mut config);
        assert_eq!(kind, ModuleKind::UdpClient);
        assert_eq!(config.udp_client.server_address, "10.0.0.1:9");
        assert_eq!(config.udp_client.message, "Hello UDP Server");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["ksock", "tcp-server", "--port", "9000", "--reply", "ok"]).unwrap();
        assert!(matches!(cli.command, Commands::TcpServer { port: Some(9000), .. }));
        assert!(cli.config.is_none());
    }
}
