//! Forwarding HTTP/WebSocket proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  FORWARD PROXY                    │
//!   Client Request    │  ┌────────┐    ┌─────────┐    ┌──────────────┐   │
//!   ──────────────────┼─▶│  http  │───▶│ routing │───▶│ HttpRelay /  │───┼──▶ Target
//!                     │  │ server │    │  state  │    │ WebSocket    │   │
//!   Client Response   │  │        │◀───│ machine │◀───│ Relay        │◀──┼─── Target
//!   ◀─────────────────┼──│        │    └─────────┘    └──────────────┘   │
//!                     │  └────────┘                                      │
//!                     │  ┌────────────────────────────────────────────┐  │
//!                     │  │ config │ security (headers, CORS) │ observ. │  │
//!                     │  └────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::cli::Cli;
use forward_proxy::lifecycle::signals::spawn_signal_handler;
use forward_proxy::observability::{logging, metrics};
use forward_proxy::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    logging::init(&config.observability);

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path_prefix = %config.proxy.path_prefix,
        connect_timeout_secs = config.timeouts.connect_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
