//! Relay Server
//!
//! Accepts producer and consumer connections and forwards the latest frame
//! of each session to its viewers.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_screen_relay::{config::AppConfig, ui::RelayServer};

/// LAN screen relay server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "LSR_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "LSR_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LSR_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.relay.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.relay.port = port;
    }
    config.validate()?;

    tracing::info!("Starting LAN Screen Relay");
    RelayServer::new(config.relay).run(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
