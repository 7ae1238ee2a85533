//! Presentation sinks for decoded frames

use image::ImageFormat;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::video::DecodedFrame;

/// Where decoded frames end up. Called from the blocking pool, one frame at a time.
pub trait FrameSink: Send + 'static {
    fn present(&mut self, frame: DecodedFrame);
}

impl FrameSink for mpsc::UnboundedSender<DecodedFrame> {
    fn present(&mut self, frame: DecodedFrame) {
        let _ = self.send(frame);
    }
}

/// An absent sink discards frames
impl<S: FrameSink> FrameSink for Option<S> {
    fn present(&mut self, frame: DecodedFrame) {
        if let Some(sink) = self {
            sink.present(frame);
        }
    }
}

/// Presents every frame to both sinks
impl<A: FrameSink, B: FrameSink> FrameSink for (A, B) {
    fn present(&mut self, frame: DecodedFrame) {
        self.0.present(frame.clone());
        self.1.present(frame);
    }
}

/// Logs a line every `interval` presented frames
pub struct LogSink {
    interval: u64,
    presented: u64,
}

impl LogSink {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            presented: 0,
        }
    }
}

impl FrameSink for LogSink {
    fn present(&mut self, frame: DecodedFrame) {
        self.presented += 1;
        if self.presented % self.interval == 0 {
            tracing::info!(
                "Rendered {} frames, latest frame {} ({}x{}, {} ms old)",
                self.presented,
                frame.frame_id,
                frame.width(),
                frame.height(),
                frame.age_ms()
            );
        }
    }
}

/// Writes the latest frame to a PNG file at most once per `min_interval`
pub struct SnapshotSink {
    path: PathBuf,
    min_interval: Duration,
    last_write: Option<Instant>,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            path: path.into(),
            min_interval,
            last_write: None,
        }
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: DecodedFrame) {
        if let Some(last) = self.last_write {
            if last.elapsed() < self.min_interval {
                return;
            }
        }

        match frame.image.save_with_format(&self.path, ImageFormat::Png) {
            Ok(()) => {
                self.last_write = Some(Instant::now());
                tracing::debug!("Snapshot of frame {} written to {}", frame.frame_id, self.path.display());
            }
            Err(e) => tracing::warn!("Failed to write snapshot {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn frame(frame_id: u64) -> DecodedFrame {
        DecodedFrame {
            frame_id,
            timestamp: 0,
            image: RgbaImage::new(8, 6),
        }
    }

    #[test]
    fn test_snapshot_throttled() {
        let path = std::env::temp_dir().join(format!("lsr-snapshot-{}.png", std::process::id()));
        let mut sink = SnapshotSink::new(&path, Duration::from_secs(60));

        sink.present(frame(1));
        let written = std::fs::metadata(&path).unwrap().modified().unwrap();
        sink.present(frame(2));
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), written);

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (8, 6));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel::<DecodedFrame>();
        let mut sink = tx;
        sink.present(frame(5));
        assert_eq!(rx.try_recv().unwrap().frame_id, 5);
    }

    #[test]
    fn test_paired_sinks_both_see_frame() {
        let (first_tx, mut first_rx) = mpsc::unbounded_channel::<DecodedFrame>();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel::<DecodedFrame>();
        let mut sink = (first_tx, Some(second_tx));
        sink.present(frame(9));
        assert_eq!(first_rx.try_recv().unwrap().frame_id, 9);
        assert_eq!(second_rx.try_recv().unwrap().frame_id, 9);

        let mut absent: (LogSink, Option<SnapshotSink>) = (LogSink::new(1), None);
        absent.present(frame(10));
    }
}
