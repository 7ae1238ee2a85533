//! # LAN Screen Relay
//!
//! Near-real-time screen mirroring over a local network through a relay that
//! keeps only the latest frame of every session.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          PRODUCER            │
//! │  ┌────────────┐              │
//! │  │FrameSource │ 25 ticks/s   │
//! │  └─────┬──────┘              │
//! │        ▼                     │
//! │  ┌────────────┐  downscale   │
//! │  │FrameEncoder│  + JPEG q60  │
//! │  └─────┬──────┘              │
//! │        ▼  1-slot outbound    │
//! │  ┌────────────┐              │
//! │  │ WebSocket  │ role=producer│
//! │  └─────┬──────┘              │
//! └────────┼─────────────────────┘
//!          │ raw JPEG bytes
//!          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RELAY SERVER                          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │           SessionManager (token → SessionState)        │  │
//! │  │   latest frame cache │ frame counter │ consumer set    │  │
//! │  └──────────────┬───────────────┬───────────────┬─────────┘  │
//! │                 ▼               ▼               ▼            │
//! │            latest slot     latest slot     latest slot       │
//! └─────────────────┼───────────────┼───────────────┼────────────┘
//!                   │ {"type":"frame","data":..,"frameId":n}
//!                   ▼               ▼               ▼
//!            ┌────────────┐  ┌────────────┐  ┌────────────┐
//!            │  CONSUMER  │  │  CONSUMER  │  │  Browser   │
//!            │ DropLatest │  │ DropLatest │  │  /stream   │
//!            │  Renderer  │  │  Renderer  │  │    page    │
//!            └────────────┘  └────────────┘  └────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod session;
pub mod ui;
pub mod video;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default relay port
    pub const DEFAULT_PORT: u16 = 3001;

    /// Default relay bind address (all interfaces)
    pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

    /// Default relay URL used by producers and viewers
    pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3001";

    /// Producer capture cadence in frames per second
    pub const DEFAULT_FRAME_RATE: u32 = 25;

    /// Width ceiling above which captured frames are downscaled
    pub const DEFAULT_MAX_WIDTH: u32 = 640;

    /// JPEG quality factor (0-100)
    pub const DEFAULT_JPEG_QUALITY: u8 = 60;

    /// Broadcast statistics are logged every N frames
    pub const STATS_LOG_INTERVAL: u64 = 25;

    /// WebSocket close code for a normal closure
    pub const NORMAL_CLOSE_CODE: u16 = 1000;

    /// Path of the embedded browser viewer
    pub const STREAM_PAGE_PATH: &str = "/stream";
}
