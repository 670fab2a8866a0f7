use clap::Parser;

use ksock::net::{Endpoint, SocketHandle};

#[derive(Parser)]
#[command(name = "ksock-send")]
#[command(about = "Send one message to a ksock TCP server", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    ip: std::net::IpAddr,

    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    #[arg(short, long, default_value = "Hello from user-space TCP client!")]
    message: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let server = Endpoint::new(cli.ip, cli.port);

    let socket = SocketHandle::tcp(server.family())?;
    socket.connect(&server)?;

    let sent = socket.send(cli.message.as_bytes())?;
    println!("Sent {} of {} bytes to {}", sent, cli.message.len(), server);

    socket.close();
    Ok(())
}
