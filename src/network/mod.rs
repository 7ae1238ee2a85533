//! Client side of the relay: producer and consumer runtimes
//!
//! Both runtimes follow the same link state machine (see [`LinkState`]) and
//! publish their status through a `watch` channel. Neither reconnects by
//! itself.

pub mod consumer;
pub mod lan;
pub mod link;
pub mod producer;
pub mod status;

pub use consumer::Consumer;
pub use lan::{resolve_share_host, session_share_url, share_url};
pub use producer::Producer;
pub use status::{LinkState, StatusHandle, StreamStatus};
