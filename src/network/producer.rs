//! Producer runtime
//!
//! Captures on a fixed cadence, encodes on the blocking pool and hands frames
//! to a writer task through a one-frame queue. When the previous frame is
//! still being written the tick is skipped: for a live mirror a stale frame
//! is worse than a missing one.

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;

use crate::codec::FrameEncoder;
use crate::config::ProducerConfig;
use crate::error::{CodecError, NetworkError};
use crate::network::link::{self, WsStream};
use crate::network::status::{StatusHandle, StreamStatus};
use crate::protocol::Role;
use crate::video::FrameSource;

/// How long a stopping producer waits for its close frame to go out
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

struct CaptureJob<S> {
    source: S,
    encoder: FrameEncoder,
}

impl<S: FrameSource> CaptureJob<S> {
    fn run(&mut self) -> Result<Bytes, CodecError> {
        let image = self.source.capture()?;
        self.encoder.encode(&image)
    }
}

/// Streams one capture source into a relay session
pub struct Producer<S> {
    config: ProducerConfig,
    token: String,
    status: StatusHandle,
    job: Arc<Mutex<CaptureJob<S>>>,
}

impl<S: FrameSource> Producer<S> {
    pub fn new(config: ProducerConfig, token: impl Into<String>, source: S) -> Result<Self, CodecError> {
        let encoder = FrameEncoder::from_config(&config)?;
        Ok(Self {
            config,
            token: token.into(),
            status: StatusHandle::new(),
            job: Arc::new(Mutex::new(CaptureJob { source, encoder })),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn status(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> StreamStatus {
        self.status.current()
    }

    /// Connect and stream until `shutdown` resolves or the link fails.
    ///
    /// Never reconnects on its own: after an error the caller decides
    /// whether to call `run` again.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), NetworkError> {
        self.status.connecting();
        let stream = match link::open(&self.config.server_url, &Role::Producer, &self.token).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Could not reach relay {}: {}", self.config.server_url, e);
                self.status.closed(Some(e.to_string()));
                return Err(e);
            }
        };

        self.status.connected();
        tracing::info!(
            "Streaming session {} at {} fps (max width {}, quality {})",
            self.token,
            self.config.frame_rate,
            self.config.max_width,
            self.config.jpeg_quality
        );

        let (write, mut read) = stream.split();
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let mut writer = tokio::spawn(write_frames(write, rx));
        let mut writer_finished = false;

        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Stopping producer for session {}", self.token);
                    break Ok(());
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Close(frame))) => break link::close_outcome(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(NetworkError::ReceiveFailed(e.to_string())),
                    None => break Err(NetworkError::ConnectionLost),
                },
                result = &mut writer => {
                    writer_finished = true;
                    break match result {
                        Ok(result) => result,
                        Err(e) => Err(NetworkError::SendFailed(e.to_string())),
                    };
                }
                _ = ticker.tick() => self.tick(&tx).await,
            }
        };

        // Dropping the queue makes the writer send a normal close
        drop(tx);
        if !writer_finished && tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }

        match &outcome {
            Ok(()) => self.status.closed(None),
            Err(e) => {
                tracing::warn!("Producer link for session {} ended: {}", self.token, e);
                self.status.closed(Some(e.to_string()));
            }
        }
        outcome
    }

    async fn tick(&self, tx: &mpsc::Sender<Bytes>) {
        let permit = match tx.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                tracing::trace!("Transport busy, skipping capture tick");
                self.status.frame_dropped();
                return;
            }
            Err(TrySendError::Closed(())) => return,
        };

        let job = Arc::clone(&self.job);
        match tokio::task::spawn_blocking(move || job.lock().run()).await {
            Ok(Ok(jpeg)) => {
                permit.send(jpeg);
                self.status.frame_done();
            }
            Ok(Err(e)) => tracing::warn!("Skipping frame: {}", e),
            Err(e) => tracing::error!("Capture task failed: {}", e),
        }
    }
}

async fn write_frames(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) -> Result<(), NetworkError> {
    while let Some(jpeg) = rx.recv().await {
        write
            .send(Message::Binary(jpeg.to_vec()))
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
    }

    if let Err(e) = write.send(link::normal_close()).await {
        tracing::debug!("Close frame not delivered: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::status::LinkState;
    use crate::video::TestPattern;

    fn producer() -> Producer<TestPattern> {
        Producer::new(ProducerConfig::default(), "t", TestPattern::new(64, 48)).unwrap()
    }

    #[tokio::test]
    async fn test_tick_skips_while_writer_busy() {
        let producer = producer();
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);
        // The writer has not taken the previous frame yet
        tx.try_send(Bytes::from_static(b"previous")).unwrap();

        producer.tick(&tx).await;
        producer.tick(&tx).await;

        let status = producer.current_status();
        assert_eq!(status.dropped, 2);
        assert_eq!(status.frames, 0);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"previous"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tick_sends_jpeg_when_writer_idle() {
        let producer = producer();
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);

        producer.tick(&tx).await;
        let jpeg = rx.recv().await.unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        // Queue drained, so the next tick goes through too
        producer.tick(&tx).await;
        assert!(rx.recv().await.is_some());

        let status = producer.current_status();
        assert_eq!(status.frames, 2);
        assert_eq!(status.dropped, 0);
        assert_eq!(status.state, LinkState::Idle);
    }

    #[tokio::test]
    async fn test_tick_after_writer_gone_is_noop() {
        let producer = producer();
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        drop(rx);

        producer.tick(&tx).await;
        let status = producer.current_status();
        assert_eq!((status.frames, status.dropped), (0, 0));
    }
}
