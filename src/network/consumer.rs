//! Consumer runtime
//!
//! Receives relay messages and feeds frames to a [`Renderer`]. Messages with
//! an unknown `type` are skipped so newer relays stay compatible.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ConsumerConfig;
use crate::error::NetworkError;
use crate::network::link;
use crate::network::status::{StatusHandle, StreamStatus};
use crate::protocol::{Role, ServerMessage};
use crate::video::{Decode, FrameSink, Renderer};

/// Views one relay session
pub struct Consumer<D, S> {
    config: ConsumerConfig,
    token: String,
    status: StatusHandle,
    renderer: Renderer<D, S>,
}

impl<D: Decode, S: FrameSink> Consumer<D, S> {
    pub fn new(config: ConsumerConfig, token: impl Into<String>, decoder: D, sink: S) -> Self {
        let status = StatusHandle::new();
        let renderer = Renderer::new(decoder, sink, status.clone());
        Self {
            config,
            token: token.into(),
            status,
            renderer,
        }
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

    pub fn renderer(&self) -> &Renderer<D, S> {
        &self.renderer
    }

    /// Connect and render until `shutdown` resolves or the link ends.
    ///
    /// Safe to call again after it returns; there is no built-in retry.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), NetworkError> {
        self.status.connecting();
        let stream = match link::open(&self.config.server_url, &Role::Consumer, &self.token).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Could not reach relay {}: {}", self.config.server_url, e);
                self.status.closed(Some(e.to_string()));
                return Err(e);
            }
        };

        self.status.connected();
        tracing::info!("Watching session {}", self.token);

        let (mut write, mut read) = stream.split();
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Err(e) = write.send(link::normal_close()).await {
                        tracing::debug!("Close frame not delivered: {}", e);
                    }
                    break Ok(());
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Close(frame))) => break link::close_outcome(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(NetworkError::ReceiveFailed(e.to_string())),
                    None => break Err(NetworkError::ConnectionLost),
                },
            }
        };

        // Frames received before the close are not rendered after it
        self.renderer.discard_pending();
        match &outcome {
            Ok(()) => {
                tracing::info!("Stopped watching session {}", self.token);
                self.status.closed(None);
            }
            Err(e) => {
                tracing::warn!("Consumer link for session {} ended: {}", self.token, e);
                self.status.closed(Some(e.to_string()));
            }
        }
        outcome
    }

    fn handle_text(&self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Frame(frame)) => self.renderer.offer(frame),
            Ok(ServerMessage::Ignored(kind)) => {
                tracing::debug!("Ignoring relay message of type {:?}", kind)
            }
            Err(e) => tracing::warn!("Unparseable relay message: {}", e),
        }
    }
}
