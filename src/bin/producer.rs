//! Screen Producer
//!
//! Streams a capture source to a relay session and prints the URL viewers
//! on the LAN can open.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use lan_screen_relay::{
    config::AppConfig,
    network::{session_share_url, Producer},
    protocol::generate_token,
    video::{FrameSource, StillImage, TestPattern},
};

/// Stream frames into a relay session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "LSR_CONFIG")]
    config: Option<PathBuf>,

    /// Relay URL, e.g. ws://192.168.1.20:3001
    #[arg(short, long, env = "LSR_SERVER_URL")]
    server: Option<String>,

    /// Session token; a fresh one is generated when omitted
    #[arg(short, long, env = "LSR_TOKEN")]
    token: Option<String>,

    /// Stream this image instead of the test pattern
    #[arg(long)]
    image: Option<PathBuf>,

    /// Capture rate in frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Frames wider than this are downscaled
    #[arg(long)]
    max_width: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Test pattern width
    #[arg(long, default_value_t = 1280)]
    pattern_width: u32,

    /// Test pattern height
    #[arg(long, default_value_t = 720)]
    pattern_height: u32,
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
    if let Some(server) = args.server.clone() {
        config.producer.server_url = server;
    }
    if let Some(fps) = args.fps {
        config.producer.frame_rate = fps;
    }
    if let Some(max_width) = args.max_width {
        config.producer.max_width = max_width;
    }
    if let Some(quality) = args.quality {
        config.producer.jpeg_quality = quality;
    }
    config.validate()?;

    let token = args.token.clone().unwrap_or_else(generate_token);
    let relay_port = Url::parse(&config.producer.server_url)
        .ok()
        .and_then(|url| url.port_or_known_default())
        .unwrap_or(config.relay.port);

    println!("\n=== Screen Relay Session ===");
    println!("  Token: {}", token);
    println!("  Open:  {}", session_share_url(&config.share, relay_port, &token));
    println!();

    match &args.image {
        Some(path) => stream(config, token, StillImage::open(path)?).await,
        None => {
            let pattern = TestPattern::new(args.pattern_width, args.pattern_height);
            stream(config, token, pattern).await
        }
    }
}

async fn stream<S: FrameSource>(config: AppConfig, token: String, source: S) -> Result<()> {
    let producer = Producer::new(config.producer, token, source)?;
    let result = producer.run(shutdown_signal()).await;

    let status = producer.current_status();
    tracing::info!(
        "Sent {} frames, skipped {} while the link was busy",
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
