//! JPEG frame encoder
//!
//! Downscales oversized captures with nearest-neighbor sampling and encodes
//! them as baseline JPEG at a fixed quality.

use bytes::Bytes;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use std::borrow::Cow;

use crate::config::ProducerConfig;
use crate::error::CodecError;

/// Frame encoder with a width ceiling and fixed quality
pub struct FrameEncoder {
    max_width: u32,
    quality: u8,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    bytes_produced: u64,
}

impl FrameEncoder {
    pub fn new(max_width: u32, quality: u8) -> Result<Self, CodecError> {
        if max_width == 0 {
            return Err(CodecError::InvalidDimensions(max_width, 0));
        }
        if !(1..=100).contains(&quality) {
            return Err(CodecError::EncodingFailed(format!(
                "JPEG quality {} is outside 1..=100",
                quality
            )));
        }

        Ok(Self {
            max_width,
            quality,
            encode_buffer: Vec::with_capacity(64 * 1024),
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    pub fn from_config(config: &ProducerConfig) -> Result<Self, CodecError> {
        Self::new(config.max_width, config.jpeg_quality)
    }

    /// Downscale to the width ceiling, preserving aspect ratio
    pub fn prepare<'a>(&self, image: &'a RgbaImage) -> Cow<'a, RgbaImage> {
        let (width, height) = image.dimensions();
        if width <= self.max_width {
            return Cow::Borrowed(image);
        }

        let (target_width, target_height) = scaled_size(width, height, self.max_width);
        Cow::Owned(imageops::resize(
            image,
            target_width,
            target_height,
            FilterType::Nearest,
        ))
    }

    /// Downscale if needed and encode to JPEG
    pub fn encode(&mut self, image: &RgbaImage) -> Result<Bytes, CodecError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions(width, height));
        }

        let prepared = self.prepare(image);
        // JPEG has no alpha channel
        let rgb: RgbImage = prepared.as_ref().convert();

        self.encode_buffer.clear();
        JpegEncoder::new_with_quality(&mut self.encode_buffer, self.quality)
            .encode_image(&rgb)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += self.encode_buffer.len() as u64;

        Ok(Bytes::copy_from_slice(&self.encode_buffer))
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
            average_frame_size: if self.frames_encoded > 0 {
                self.bytes_produced as f32 / self.frames_encoded as f32
            } else {
                0.0
            },
        }
    }
}

/// Target size for a `width`×`height` surface under a width ceiling
pub fn scaled_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scale = max_width as f64 / width as f64;
    let scaled_height = ((height as f64 * scale) as u32).max(1);
    (max_width, scaled_height)
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub average_frame_size: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(1280, 720, 640), (640, 360));
        assert_eq!(scaled_size(1920, 1080, 640), (640, 360));
        assert_eq!(scaled_size(640, 480, 640), (640, 480));
        assert_eq!(scaled_size(320, 200, 640), (320, 200));
        assert_eq!(scaled_size(4000, 1, 640), (640, 1));
    }

    #[test]
    fn test_small_frames_not_resized() {
        let encoder = FrameEncoder::new(640, 60).unwrap();
        let image = RgbaImage::new(320, 240);
        assert!(matches!(encoder.prepare(&image), Cow::Borrowed(_)));
    }

    #[test]
    fn test_nearest_neighbor_downscale() {
        let encoder = FrameEncoder::new(2, 60).unwrap();
        // Left half red, right half blue
        let image = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });

        let prepared = encoder.prepare(&image);
        assert_eq!(prepared.dimensions(), (2, 1));
        assert_eq!(prepared.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(prepared.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let mut encoder = FrameEncoder::new(640, 60).unwrap();
        let image = RgbaImage::from_pixel(1280, 720, Rgba([30, 120, 200, 255]));

        let jpeg = encoder.encode(&image).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 360));
        assert_eq!(encoder.stats().frames_encoded, 1);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(FrameEncoder::new(0, 60).is_err());
        assert!(FrameEncoder::new(640, 0).is_err());

        let mut encoder = FrameEncoder::new(640, 60).unwrap();
        assert!(matches!(
            encoder.encode(&RgbaImage::new(0, 0)),
            Err(CodecError::InvalidDimensions(0, 0))
        ));
    }
}
