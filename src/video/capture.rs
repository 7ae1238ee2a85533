//! Capture sources for the producer
//!
//! Grabbing the real desktop belongs to the host shell; it plugs in through
//! [`FrameSource`]. Two self-contained sources ship with the crate.

use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::error::CodecError;

/// A visual surface sampled once per capture tick
pub trait FrameSource: Send + 'static {
    fn capture(&mut self) -> Result<RgbaImage, CodecError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<RgbaImage, CodecError> + Send + 'static,
{
    fn capture(&mut self) -> Result<RgbaImage, CodecError> {
        self()
    }
}

/// Animated gradient with a sweeping bar
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            tick: 0,
        }
    }
}

impl FrameSource for TestPattern {
    fn capture(&mut self) -> Result<RgbaImage, CodecError> {
        let (width, height) = (self.width, self.height);
        let bar_width = (width / 16).max(1);
        let bar_x = self.tick.wrapping_mul(8) % width;
        self.tick = self.tick.wrapping_add(1);

        Ok(RgbaImage::from_fn(width, height, |x, y| {
            if x >= bar_x && x < bar_x + bar_width {
                return Rgba([255, 255, 255, 255]);
            }
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            Rgba([r, g, 128, 255])
        }))
    }
}

/// A still image re-sent on every tick
pub struct StillImage {
    image: RgbaImage,
}

impl StillImage {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| CodecError::CaptureFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(image.into_rgba8()))
    }
}

impl FrameSource for StillImage {
    fn capture(&mut self) -> Result<RgbaImage, CodecError> {
        Ok(self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_animates() {
        let mut pattern = TestPattern::new(160, 90);
        let first = pattern.capture().unwrap();
        let second = pattern.capture().unwrap();

        assert_eq!(first.dimensions(), (160, 90));
        assert_ne!(first, second);
    }

    #[test]
    fn test_closure_source() {
        let mut calls = 0;
        let mut source = move || {
            calls += 1;
            if calls > 1 {
                Err(CodecError::CaptureFailed("surface gone".into()))
            } else {
                Ok(RgbaImage::new(4, 4))
            }
        };

        assert!(FrameSource::capture(&mut source).is_ok());
        assert!(FrameSource::capture(&mut source).is_err());
    }

    #[test]
    fn test_missing_still_image() {
        assert!(matches!(
            StillImage::open("/nonexistent/frame.png"),
            Err(CodecError::CaptureFailed(_))
        ));
    }
}
