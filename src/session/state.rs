//! Per-session relay state

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// Latest-wins slot of serialized frame messages for one consumer.
/// A frame the consumer has not picked up yet is overwritten by the next one.
pub type FrameSender = watch::Sender<Option<Arc<str>>>;

/// Receiving side of a [`FrameSender`]
pub type FrameReceiver = watch::Receiver<Option<Arc<str>>>;

/// The most recently broadcast frame of a session
#[derive(Debug, Clone)]
pub struct CachedFrame {
    pub frame_id: u64,
    pub timestamp: u64,
    /// Serialized `FrameMessage`, shared by every recipient
    pub message: Arc<str>,
}

/// Mutable state of one session, always accessed under its lock
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) producer: Option<ConnectionId>,
    pub(crate) consumers: HashMap<ConnectionId, FrameSender>,
    pub(crate) latest: Option<CachedFrame>,
    pub(crate) frame_counter: u64,
    /// Set once the entry has been removed from the session map
    pub(crate) retired: bool,
}

impl SessionState {
    pub fn has_producer(&self) -> bool {
        self.producer.is_some()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn latest(&self) -> Option<&CachedFrame> {
        self.latest.as_ref()
    }

    /// No producer and no consumers: the entry can be dropped
    pub fn is_idle(&self) -> bool {
        self.producer.is_none() && self.consumers.is_empty()
    }

    /// Forget the cached frame and restart numbering at 1
    pub(crate) fn reset_stream(&mut self) {
        self.latest = None;
        self.frame_counter = 0;
    }
}

/// Snapshot of one session for the status API
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionInfo {
    pub token: String,
    pub has_producer: bool,
    pub consumers: usize,
    pub latest_frame_id: Option<u64>,
}
