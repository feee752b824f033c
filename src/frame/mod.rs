//! Frame data structures for captured video and document content

pub mod sampler;

pub use sampler::sample_window;

use anyhow::{Context, Result};
use image::RgbaImage;

/// A decoded image buffer. Frames have no identity beyond their position in
/// the sequence they were captured from.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Create a new frame from raw RGBA data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Create a blank (zero-valued) frame of the given resolution
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the pixel buffer matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }

    /// Build a frame from a decoded RGBA image
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    /// View this frame as an `image::RgbaImage`
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .context("frame buffer does not match its declared dimensions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_is_zeroed() {
        let frame = Frame::blank(4, 2);
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert!(frame.data.iter().all(|&b| b == 0));
        assert!(frame.is_well_formed());
    }

    #[test]
    fn test_rgba_image_roundtrip() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        let frame = Frame::from_rgba_image(img);
        assert!(frame.is_well_formed());

        let back = frame.to_rgba_image().unwrap();
        assert_eq!(back.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_malformed_frame_detected() {
        let frame = Frame::new(vec![0u8; 7], 2, 2);
        assert!(!frame.is_well_formed());
        assert!(frame.to_rgba_image().is_err());
    }
}
