//! Single-target logging reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 RELAY PROXY                  │
//!     Client Request     │  ┌────────┐   ┌───────────┐   ┌──────────┐  │
//!     ───────────────────┼─▶│  http  │──▶│ intercept │──▶│ forward  │──┼──▶ Upstream
//!                        │  │ server │   │parse + log│   │  engine  │  │
//!                        │  └────────┘   └─────┬─────┘   └────┬─────┘  │
//!     Client Response    │                     │              │        │
//!     ◀──────────────────┼─────────────────────┼──────────────┘        │
//!                        │                     ▼                       │
//!                        │               ┌──────────┐                  │
//!                        │               │ log sink │                  │
//!                        │               └──────────┘                  │
//!                        │  config · observability · lifecycle         │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::loader::load_from_env;
use relay_proxy::http::HttpServer;
use relay_proxy::lifecycle::{signals, Shutdown};
use relay_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Relay every request to one upstream, logging each one", long_about = None)]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_from_env(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        upstream = %config.upstream.url,
        max_body_bytes = config.limits.max_body_bytes,
        request_timeout_ms = config.timeouts.request_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
