//! Frame decoder for relay messages

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CodecError;
use crate::protocol::FrameMessage;
use crate::video::DecodedFrame;

/// Decodes base64 JPEG frames into RGBA images
#[derive(Debug, Default)]
pub struct FrameDecoder {
    frames_decoded: AtomicU64,
    failures: AtomicU64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a relay frame message
    pub fn decode_message(&self, frame: &FrameMessage) -> Result<DecodedFrame, CodecError> {
        let result = decode_base64(&frame.data).and_then(|bytes| decode_image(&bytes));
        match result {
            Ok(image) => {
                self.frames_decoded.fetch_add(1, Ordering::Relaxed);
                Ok(DecodedFrame {
                    frame_id: frame.frame_id,
                    timestamp: frame.timestamp,
                    image,
                })
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Base64 payload, tolerating a `data:image/...;base64,` prefix
fn decode_base64(data: &str) -> Result<Vec<u8>, CodecError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| CodecError::InvalidPayload(e.to_string()))
}

fn decode_image(bytes: &[u8]) -> Result<RgbaImage, CodecError> {
    image::load_from_memory(bytes)
        .map(|image| image.into_rgba8())
        .map_err(|e| CodecError::DecodingFailed(e.to_string()))
}

/// Decoder statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub failures: u64,
}
