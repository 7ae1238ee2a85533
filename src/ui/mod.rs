//! Relay HTTP surface
//!
//! One axum router carries the WebSocket relay endpoint, the JSON status
//! API and the embedded browser viewer.

pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{AppState, RelayServer};
