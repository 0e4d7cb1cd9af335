//! # Mailroom Server
//!
//! Per-room realtime relay: webhook-delivered messages fan out to live
//! WebSocket viewers, with a bounded durable history replayed to every new
//! connection.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! mailroom
//!
//! # Run with environment variables
//! MAILROOM_PORT=8080 MAILROOM_HOST=0.0.0.0 mailroom
//! ```
//!
//! Configuration is read from `mailroom.toml` if present (see
//! `config::Config::load` for the search paths).

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailroom=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Mailroom on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
