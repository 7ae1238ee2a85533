//! Observable link status for producers and consumers
//!
//! A single current error is kept: it is cleared when a connection opens and
//! replaced by the next failure. No error history is retained.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Link state machine
///
/// `Idle → Connecting → Connected ⇄ Rendering → Closed`, and `Closed` may go
/// back to `Connecting` when the caller reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Consumer only: a decode is in flight
    Rendering,
    Closed,
}

impl LinkState {
    pub fn is_open(self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Rendering)
    }
}

/// Snapshot published on every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub state: LinkState,
    pub error: Option<String>,
    /// Frames sent (producer) or rendered (consumer) since the runtime was created
    pub frames: u64,
    /// Frames skipped by the drop-latest policy
    pub dropped: u64,
}

/// Shared writer side of a status channel
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: Arc<watch::Sender<StreamStatus>>,
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StreamStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StreamStatus {
        self.tx.borrow().clone()
    }

    pub fn connecting(&self) {
        self.tx.send_modify(|s| s.state = LinkState::Connecting);
    }

    /// Link is open; any previous error is cleared
    pub fn connected(&self) {
        self.tx.send_modify(|s| {
            s.state = LinkState::Connected;
            s.error = None;
        });
    }

    /// Link ended; `error` replaces the current error when present
    pub fn closed(&self, error: Option<String>) {
        self.tx.send_modify(|s| {
            s.state = LinkState::Closed;
            if error.is_some() {
                s.error = error;
            }
        });
    }

    /// Toggle between `Connected` and `Rendering` while the link is open
    pub fn rendering(&self, active: bool) {
        let target = if active {
            LinkState::Rendering
        } else {
            LinkState::Connected
        };
        self.tx.send_if_modified(|s| {
            if s.state.is_open() && s.state != target {
                s.state = target;
                true
            } else {
                false
            }
        });
    }

    pub fn frame_done(&self) {
        self.tx.send_modify(|s| s.frames += 1);
    }

    pub fn frame_dropped(&self) {
        self.tx.send_modify(|s| s.dropped += 1);
    }

    pub fn set_dropped(&self, dropped: u64) {
        self.tx.send_if_modified(|s| {
            let changed = s.dropped != dropped;
            s.dropped = dropped;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_cleared_on_connect() {
        let status = StatusHandle::new();
        status.connecting();
        status.closed(Some("relay unreachable".into()));
        assert_eq!(status.current().state, LinkState::Closed);
        assert_eq!(status.current().error.as_deref(), Some("relay unreachable"));

        status.connecting();
        status.connected();
        assert_eq!(status.current().error, None);

        status.closed(None);
        assert_eq!(status.current().error, None);
    }

    #[test]
    fn test_rendering_only_while_open() {
        let status = StatusHandle::new();
        status.rendering(true);
        assert_eq!(status.current().state, LinkState::Idle);

        status.connected();
        status.rendering(true);
        assert_eq!(status.current().state, LinkState::Rendering);
        status.rendering(false);
        assert_eq!(status.current().state, LinkState::Connected);

        status.closed(None);
        status.rendering(true);
        assert_eq!(status.current().state, LinkState::Closed);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let status = StatusHandle::new();
        let mut rx = status.subscribe();
        status.connected();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().state, LinkState::Connected);
    }
}
