//! Header-gated reverse proxy filter.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 RELAY-GATE                    │
//!                    │                                               │
//! Client Request     │  ┌────────┐   ┌─────────────────────────┐    │
//! ───────────────────┼─▶│  http  │──▶│ filter (one per route)  │    │
//!                    │  │ server │   │  prefix → header → rate │    │
//!                    │  └────────┘   │  limit → forward        │────┼──▶ Upstream
//!                    │               └────────────┬────────────┘    │    Target
//!                    │                            │                 │
//! Client Response    │  ┌─────────────────┐  ┌────▼────────────┐    │
//! ◀──────────────────┼──│ response tee    │◀─│ upstream client │◀───┼──── Response
//!                    │  │ (log + gzip)    │  └─────────────────┘    │
//!                    │  └─────────────────┘                         │
//!                    │                                               │
//!                    │  ┌────────────────────────────────────────┐  │
//!                    │  │        Cross-Cutting Concerns           │  │
//!                    │  │  ┌────────┐ ┌──────────┐ ┌───────────┐ │  │
//!                    │  │  │ config │ │ security │ │  tracing  │ │  │
//!                    │  │  └────────┘ └──────────┘ └───────────┘ │  │
//!                    │  └────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_gate::config::load_config;
use relay_gate::http::HttpServer;

#[derive(Parser)]
#[command(name = "relay-gate")]
#[command(about = "Header-gated reverse proxy filter", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay-gate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_gate=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("relay-gate v0.1.0 starting");

    let config = load_config(&cli.config)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
