//! Drop-latest render pipeline
//!
//! Frames are decoded on the blocking pool one at a time. A frame that
//! arrives while a decode is in flight waits in a single slot; a newer
//! arrival replaces it. Decode failures drop the frame and whatever was
//! waiting, and the pipeline goes back to idle.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::codec::FrameDecoder;
use crate::error::CodecError;
use crate::network::status::StatusHandle;
use crate::protocol::FrameMessage;
use crate::video::{DecodedFrame, DropLatest, FrameSink};

/// Turns a relay frame into pixels
pub trait Decode: Send + Sync + 'static {
    fn decode(&self, frame: &FrameMessage) -> Result<DecodedFrame, CodecError>;
}

impl Decode for FrameDecoder {
    fn decode(&self, frame: &FrameMessage) -> Result<DecodedFrame, CodecError> {
        self.decode_message(frame)
    }
}

struct Inner<D, S> {
    decoder: D,
    sink: Mutex<S>,
    slot: Mutex<DropLatest<FrameMessage>>,
    status: StatusHandle,
}

impl<D: Decode, S: FrameSink> Inner<D, S> {
    fn render(&self, frame: &FrameMessage) -> Result<(), CodecError> {
        let decoded = self.decoder.decode(frame)?;
        self.sink.lock().present(decoded);
        Ok(())
    }
}

/// Consumer-side render pipeline
pub struct Renderer<D, S> {
    inner: Arc<Inner<D, S>>,
}

impl<D, S> Clone for Renderer<D, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Decode, S: FrameSink> Renderer<D, S> {
    pub fn new(decoder: D, sink: S, status: StatusHandle) -> Self {
        Self {
            inner: Arc::new(Inner {
                decoder,
                sink: Mutex::new(sink),
                slot: Mutex::new(DropLatest::new()),
                status,
            }),
        }
    }

    /// Hand a frame to the pipeline. Must be called from a Tokio runtime.
    pub fn offer(&self, frame: FrameMessage) {
        let start = {
            let mut slot = self.inner.slot.lock();
            let start = slot.offer(frame);
            if start.is_some() {
                self.inner.status.rendering(true);
            } else {
                self.inner.status.set_dropped(slot.dropped());
            }
            start
        };

        if let Some(frame) = start {
            tokio::spawn(Self::drive(Arc::clone(&self.inner), frame));
        }
    }

    /// Drop the frame waiting behind the current decode, if any.
    ///
    /// Called when the link ends so nothing received before the close is
    /// rendered afterwards.
    pub fn discard_pending(&self) {
        let mut slot = self.inner.slot.lock();
        if slot.discard_pending() {
            self.inner.status.set_dropped(slot.dropped());
        }
    }

    /// Frames discarded in favor of newer ones
    pub fn dropped(&self) -> u64 {
        self.inner.slot.lock().dropped()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.slot.lock().is_busy()
    }

    async fn drive(inner: Arc<Inner<D, S>>, first: FrameMessage) {
        let mut next = Some(first);
        while let Some(frame) = next.take() {
            let frame_id = frame.frame_id;
            let job = Arc::clone(&inner);
            let outcome = tokio::task::spawn_blocking(move || job.render(&frame)).await;

            let mut slot = inner.slot.lock();
            match outcome {
                Ok(Ok(())) => {
                    inner.status.frame_done();
                    next = slot.complete();
                }
                Ok(Err(e)) => {
                    tracing::warn!("Dropping frame {}: {}", frame_id, e);
                    slot.abandon();
                }
                Err(e) => {
                    tracing::error!("Render job for frame {} failed: {}", frame_id, e);
                    slot.abandon();
                }
            }
            if next.is_none() {
                inner.status.rendering(false);
            }
            inner.status.set_dropped(slot.dropped());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct SlowDecoder {
        delay: Duration,
        fail_on: Option<u64>,
    }

    impl Decode for SlowDecoder {
        fn decode(&self, frame: &FrameMessage) -> Result<DecodedFrame, CodecError> {
            std::thread::sleep(self.delay);
            if self.fail_on == Some(frame.frame_id) {
                return Err(CodecError::DecodingFailed("corrupt".into()));
            }
            Ok(DecodedFrame {
                frame_id: frame.frame_id,
                timestamp: frame.timestamp,
                image: RgbaImage::new(2, 2),
            })
        }
    }

    fn frame(frame_id: u64) -> FrameMessage {
        FrameMessage::new(frame_id, 0, "payload".into())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_burst_renders_in_flight_then_newest() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let status = StatusHandle::new();
        status.connected();
        let decoder = SlowDecoder {
            delay: Duration::from_millis(200),
            fail_on: None,
        };
        let renderer = Renderer::new(decoder, tx, status.clone());

        // 2, 3 and 4 arrive during 1's decode and are superseded by 5
        for id in 1..=5 {
            renderer.offer(frame(id));
        }
        assert_eq!(status.current().state, crate::network::LinkState::Rendering);

        let first = timeout(Duration::from_secs(3), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(3), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.frame_id, 1);
        assert_eq!(second.frame_id, 5);
        assert!(timeout(Duration::from_millis(400), rx.recv()).await.is_err());

        assert_eq!(renderer.dropped(), 3);
        assert!(!renderer.is_busy());
        let current = status.current();
        assert_eq!(current.frames, 2);
        assert_eq!(current.dropped, 3);
        assert_eq!(current.state, crate::network::LinkState::Connected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_discarded_frame_is_never_rendered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let status = StatusHandle::new();
        let decoder = SlowDecoder {
            delay: Duration::from_millis(200),
            fail_on: None,
        };
        let renderer = Renderer::new(decoder, tx, status.clone());

        renderer.offer(frame(1));
        renderer.offer(frame(2));
        renderer.discard_pending();
        assert_eq!(status.current().dropped, 1);

        let first = timeout(Duration::from_secs(3), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.frame_id, 1);
        assert!(timeout(Duration::from_millis(400), rx.recv()).await.is_err());
        assert!(!renderer.is_busy());
        assert_eq!(status.current().frames, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decode_failure_is_isolated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let decoder = SlowDecoder {
            delay: Duration::from_millis(100),
            fail_on: Some(1),
        };
        let renderer = Renderer::new(decoder, tx, StatusHandle::new());

        renderer.offer(frame(1));
        renderer.offer(frame(2));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!renderer.is_busy());
        assert!(rx.try_recv().is_err());

        renderer.offer(frame(3));
        let rendered = timeout(Duration::from_secs(3), rx.recv()).await.unwrap().unwrap();
        assert_eq!(rendered.frame_id, 3);
    }
}
