//! JPEG codec wrapper
//!
//! Producer-side downscale + encode and consumer-side decode of frames.

pub mod encoder;
pub mod decoder;

pub use encoder::FrameEncoder;
pub use decoder::FrameDecoder;
