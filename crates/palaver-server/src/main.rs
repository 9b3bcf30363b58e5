//! Palaver server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: listen on 0.0.0.0:34551
//! palaver-server
//!
//! # Custom bind address
//! palaver-server --bind 127.0.0.1:4000
//! ```

use std::net::SocketAddr;

use clap::Parser;
use palaver_server::{Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Palaver chat room server
#[derive(Parser, Debug)]
#[command(name = "palaver-server")]
#[command(about = "Encrypted chat room server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:34551")]
    bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let server = Server::bind(&ServerConfig { bind: args.bind })?;
    tracing::info!("server listening on {}", server.local_addr()?);

    server.run()?;
    Ok(())
}
