//! Session management for the relay

pub mod manager;
pub mod state;

pub use manager::{BroadcastReport, Connection, ConnectionHandle, FramePayload, RelayStats, SessionManager};
pub use state::{CachedFrame, ConnectionId, FrameReceiver, FrameSender, SessionInfo, SessionState};
