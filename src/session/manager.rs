//! Session manager
//!
//! Owns every session's latest-frame cache and connection sets. Each session
//! sits behind its own lock, so a broadcast is atomic with respect to other
//! connects, disconnects and broadcasts of the same session while independent
//! sessions proceed in parallel.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{FrameMessage, Role};
use crate::session::state::{CachedFrame, ConnectionId, FrameReceiver, SessionInfo, SessionState};

/// Identity of a registered connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub role: Role,
    pub token: String,
}

/// Result of registering a connection
#[derive(Debug)]
pub struct Connection {
    pub handle: ConnectionHandle,
    /// Latest serialized frame to forward to the socket (consumers only)
    pub outbound: Option<FrameReceiver>,
}

/// Payload received from a producer
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Raw encoded image bytes
    Binary(Vec<u8>),
    /// Already text-encoded (base64) image, forwarded untouched
    Text(String),
}

impl FramePayload {
    fn into_data(self) -> String {
        match self {
            FramePayload::Binary(bytes) => STANDARD.encode(bytes),
            FramePayload::Text(text) => text,
        }
    }
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub frame_id: u64,
    /// Consumers whose slot now holds the frame
    pub recipients: usize,
    /// Consumers dropped because their connection is gone
    pub removed: usize,
}

/// Relay-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RelayStats {
    pub sessions: usize,
    pub producers: usize,
    pub consumers: usize,
    pub frames_relayed: u64,
}

/// Token-scoped session store
pub struct SessionManager {
    sessions: DashMap<String, Arc<Mutex<SessionState>>>,
    next_id: AtomicU64,
    frames_relayed: AtomicU64,
    stats_interval: u64,
}

impl SessionManager {
    pub fn new(stats_interval: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            frames_relayed: AtomicU64::new(0),
            stats_interval: stats_interval.max(1),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.stats_interval)
    }

    /// Register a connection.
    ///
    /// Consumers get a latest-wins outbound slot that already holds the
    /// session's cached frame, if any. A producer is refused while another producer
    /// is active for the same token.
    pub fn connect(&self, role: Role, token: &str) -> Result<Connection, RelayError> {
        if role.requires_token() && token.is_empty() {
            return Err(RelayError::MissingToken(role.to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ConnectionHandle {
            id,
            role: role.clone(),
            token: token.to_string(),
        };

        match role {
            Role::Producer => {
                self.with_session(token, |state| match state.producer {
                    Some(active) => {
                        tracing::warn!(
                            "Rejecting producer {} for session {}: producer {} is active",
                            id,
                            token,
                            active
                        );
                        Err(RelayError::ProducerAlreadyActive(token.to_string()))
                    }
                    None => {
                        state.producer = Some(id);
                        state.reset_stream();
                        Ok(())
                    }
                })?;
                tracing::info!("Producer {} connected to session {}", id, token);
                Ok(Connection {
                    handle,
                    outbound: None,
                })
            }
            Role::Consumer => {
                let (tx, rx) = watch::channel(None);
                let (total, initial) = self.with_session(token, |state| {
                    let initial = state.latest.as_ref().map(|frame| {
                        // Bumps the version, so the receiver sees it as unread
                        tx.send_replace(Some(Arc::clone(&frame.message)));
                        frame.frame_id
                    });
                    state.consumers.insert(id, tx);
                    (state.consumers.len(), initial)
                });

                match initial {
                    Some(frame_id) => tracing::info!(
                        "Consumer {} joined session {} ({} total), sent cached frame {}",
                        id,
                        token,
                        total,
                        frame_id
                    ),
                    None => tracing::info!(
                        "Consumer {} joined session {} ({} total), no frame available yet",
                        id,
                        token,
                        total
                    ),
                }
                Ok(Connection {
                    handle,
                    outbound: Some(rx),
                })
            }
            Role::Other(ref name) => {
                tracing::debug!("Pass-through connection {} with role {:?}", id, name);
                Ok(Connection {
                    handle,
                    outbound: None,
                })
            }
        }
    }

    /// Number, cache and fan out a frame received from a session's producer
    pub fn publish(
        &self,
        handle: &ConnectionHandle,
        payload: FramePayload,
    ) -> Result<BroadcastReport, RelayError> {
        let session = self
            .session(&handle.token)
            .ok_or_else(|| RelayError::SessionNotFound(handle.token.clone()))?;
        let data = payload.into_data();

        let mut state = session.lock();
        if state.producer != Some(handle.id) {
            return Err(RelayError::NotProducer(handle.id));
        }

        state.frame_counter += 1;
        let frame_id = state.frame_counter;
        let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let message: Arc<str> = serde_json::to_string(&FrameMessage::new(frame_id, timestamp, data))
            .map_err(|e| RelayError::Serialization(e.to_string()))?
            .into();

        state.latest = Some(CachedFrame {
            frame_id,
            timestamp,
            message: Arc::clone(&message),
        });

        let mut report = BroadcastReport {
            frame_id,
            recipients: 0,
            removed: 0,
        };
        let mut gone = Vec::new();
        for (&consumer_id, tx) in state.consumers.iter() {
            if tx.is_closed() {
                tracing::warn!(
                    "Dropping consumer {} from session {}: connection closed",
                    consumer_id,
                    handle.token
                );
                gone.push(consumer_id);
                continue;
            }

            // Overwrites a frame the consumer has not picked up yet
            tx.send_replace(Some(Arc::clone(&message)));
            report.recipients += 1;
        }
        for consumer_id in gone {
            state.consumers.remove(&consumer_id);
            report.removed += 1;
        }

        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        if frame_id % self.stats_interval == 0 {
            tracing::info!(
                "Frame {} broadcast to {} consumers (total consumers: {}, session {})",
                frame_id,
                report.recipients,
                state.consumers.len(),
                handle.token
            );
        }

        Ok(report)
    }

    /// Unregister a connection. A departing producer clears the cache.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        let Some(session) = self.session(&handle.token) else {
            return;
        };

        {
            let mut state = session.lock();
            match handle.role {
                Role::Producer => {
                    if state.producer == Some(handle.id) {
                        state.producer = None;
                        state.reset_stream();
                        tracing::info!(
                            "Producer {} left session {}, cache cleared",
                            handle.id,
                            handle.token
                        );
                    }
                }
                Role::Consumer => {
                    if state.consumers.remove(&handle.id).is_some() {
                        tracing::info!(
                            "Consumer {} left session {}, remaining: {}",
                            handle.id,
                            handle.token,
                            state.consumers.len()
                        );
                    }
                }
                Role::Other(_) => {}
            }
        }

        self.remove_if_idle(&handle.token);
    }

    pub fn session_info(&self, token: &str) -> Option<SessionInfo> {
        let session = self.session(token)?;
        let state = session.lock();
        Some(SessionInfo {
            token: token.to_string(),
            has_producer: state.has_producer(),
            consumers: state.consumer_count(),
            latest_frame_id: state.latest().map(|f| f.frame_id),
        })
    }

    pub fn stats(&self) -> RelayStats {
        let mut stats = RelayStats {
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            ..Default::default()
        };
        for entry in self.sessions.iter() {
            let state = entry.value().lock();
            stats.sessions += 1;
            stats.producers += usize::from(state.has_producer());
            stats.consumers += state.consumer_count();
        }
        stats
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, token: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.get(token).map(|entry| Arc::clone(entry.value()))
    }

    /// Run `f` on the live state of `token`, creating the session if needed
    fn with_session<R>(&self, token: &str, f: impl FnOnce(&mut SessionState) -> R) -> R {
        loop {
            let session = Arc::clone(self.sessions.entry(token.to_string()).or_default().value());
            let mut state = session.lock();
            // Lost a race with remove_if_idle; the map holds a new entry now
            if !state.retired {
                return f(&mut state);
            }
        }
    }

    fn remove_if_idle(&self, token: &str) {
        let removed = self.sessions.remove_if(token, |_, session| {
            let mut state = session.lock();
            if state.is_idle() {
                state.retired = true;
                true
            } else {
                false
            }
        });
        if removed.is_some() {
            tracing::debug!("Session {} closed", token);
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}
