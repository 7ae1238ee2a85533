//! Video subsystem: capture sources, the drop-latest buffer, rendering

pub mod buffer;
pub mod capture;
pub mod render;
pub mod sink;

pub use buffer::DropLatest;
pub use capture::{FrameSource, StillImage, TestPattern};
pub use render::{Decode, Renderer};
pub use sink::{FrameSink, LogSink, SnapshotSink};

use image::RgbaImage;

/// A decoded frame ready for presentation
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame_id: u64,
    /// Unix milliseconds at which the relay received the frame
    pub timestamp: u64,
    pub image: RgbaImage,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Milliseconds since the relay received this frame
    pub fn age_ms(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        now.saturating_sub(self.timestamp)
    }
}
