//! Headless Viewer
//!
//! Watches a relay session, logging rendered frames and optionally keeping
//! a PNG snapshot of the latest one.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_screen_relay::{
    codec::FrameDecoder,
    config::AppConfig,
    network::Consumer,
    video::{LogSink, SnapshotSink},
};

/// Watch a relay session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session token printed by the producer
    #[arg(short, long, env = "LSR_TOKEN")]
    token: String,

    /// Configuration file (TOML)
    #[arg(short, long, env = "LSR_CONFIG")]
    config: Option<PathBuf>,

    /// Relay URL, e.g. ws://192.168.1.20:3001
    #[arg(short, long, env = "LSR_SERVER_URL")]
    server: Option<String>,

    /// Keep the latest frame in this PNG file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Minimum milliseconds between snapshot writes
    #[arg(long, default_value_t = 1000)]
    snapshot_interval_ms: u64,

    /// Log every N rendered frames
    #[arg(long)]
    log_interval: Option<u64>,
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
    if let Some(server) = args.server {
        config.consumer.server_url = server;
    }
    if let Some(interval) = args.log_interval {
        config.consumer.log_interval = interval;
    }
    config.validate()?;

    let snapshot = args
        .snapshot
        .map(|path| SnapshotSink::new(path, Duration::from_millis(args.snapshot_interval_ms)));
    let sink = (LogSink::new(config.consumer.log_interval), snapshot);

    let consumer = Consumer::new(config.consumer, args.token, FrameDecoder::new(), sink);
    let result = consumer.run(shutdown_signal()).await;

    let status = consumer.current_status();
    tracing::info!(
        "Rendered {} frames, dropped {} behind a busy decoder",
        status.frames,
        status.dropped
    );
    result?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
