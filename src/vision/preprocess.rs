//! Tensor preprocessing for the verification models
//!
//! Converts RGBA frames into channel-major, normalized float tensors. Two
//! normalization policies coexist and must stay distinct: the liveness /
//! document path uses ImageNet per-channel statistics, while the
//! face-embedding path uses symmetric `(pixel - 127.5) / 128.0`. They
//! correspond to different trained models.

use image::imageops::FilterType;
use image::RgbaImage;
use ndarray::{Array4, Array5};

use crate::error::VerifyError;
use crate::frame::Frame;

/// Per-channel mean for the liveness/document path (ImageNet statistics).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel std for the liveness/document path (ImageNet statistics).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize a frame to the model input resolution.
fn resize_rgba(frame: &Frame, width: u32, height: u32) -> Result<RgbaImage, VerifyError> {
    let image = frame
        .to_rgba_image()
        .map_err(|e| VerifyError::Inference(e.to_string()))?;
    if frame.dimensions() == (width, height) {
        return Ok(image);
    }
    Ok(image::imageops::resize(
        &image,
        width,
        height,
        FilterType::Triangle,
    ))
}

/// Convert one frame to a `(1, 3, H, W)` tensor with per-channel mean/std
/// normalization: `(value / 255 - mean[c]) / std[c]`. Output is channel-major:
/// all of channel 0, then channel 1, then channel 2.
pub fn image_tensor(
    frame: &Frame,
    width: u32,
    height: u32,
    mean: &[f32; 3],
    std: &[f32; 3],
) -> Result<Array4<f32>, VerifyError> {
    let resized = resize_rgba(frame, width, height)?;
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for y in 0..height as usize {
        for x in 0..width as usize {
            let pixel = resized.get_pixel(x as u32, y as u32).0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }
    }

    Ok(tensor)
}

/// Convert a frame window to a `(1, T, 3, H, W)` tensor. Frames are laid out
/// in window order, each frame channel-major.
pub fn window_tensor(
    frames: &[Frame],
    width: u32,
    height: u32,
    mean: &[f32; 3],
    std: &[f32; 3],
) -> Result<Array5<f32>, VerifyError> {
    let mut tensor =
        Array5::<f32>::zeros((1, frames.len(), 3, height as usize, width as usize));

    for (t, frame) in frames.iter().enumerate() {
        let resized = resize_rgba(frame, width, height)?;
        for y in 0..height as usize {
            for x in 0..width as usize {
                let pixel = resized.get_pixel(x as u32, y as u32).0;
                for c in 0..3 {
                    tensor[[0, t, c, y, x]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
                }
            }
        }
    }

    Ok(tensor)
}

/// Convert a face crop to the embedding model's `(1, 3, S, S)` input with
/// symmetric normalization `(pixel - 127.5) / 128.0`, mapping [0, 255] into
/// [-1, 1]. Not interchangeable with [`image_tensor`].
pub fn embedding_tensor(frame: &Frame, size: u32) -> Result<Array4<f32>, VerifyError> {
    let resized = resize_rgba(frame, size, size)?;
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

    for y in 0..side {
        for x in 0..side {
            let pixel = resized.get_pixel(x as u32, y as u32).0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 - 127.5) / 128.0;
            }
        }
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 frame with distinct per-pixel colors.
    fn test_frame() -> Frame {
        let data = vec![
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            128, 128, 128, 255, // gray
        ];
        Frame::new(data, 2, 2)
    }

    #[test]
    fn test_image_tensor_shape_and_normalization() {
        let frame = test_frame();
        let tensor = image_tensor(&frame, 2, 2, &IMAGENET_MEAN, &IMAGENET_STD).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 2, 2));

        // Red pixel at (0,0): R channel near (1.0 - mean) / std, G near (0 - mean) / std.
        let r = tensor[[0, 0, 0, 0]];
        let g = tensor[[0, 1, 0, 0]];
        assert!((r - (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0]).abs() < 1e-5);
        assert!((g - (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1]).abs() < 1e-5);
    }

    #[test]
    fn test_image_tensor_channel_major_order() {
        let frame = test_frame();
        let tensor = image_tensor(&frame, 2, 2, &[0.0; 3], &[1.0; 3]).unwrap();
        let (flat, _) = tensor.into_raw_vec_and_offset();

        // All of channel 0 first: R values of the four pixels in row order.
        let expected_r: Vec<f32> = [255u8, 0, 0, 128]
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect();
        assert_eq!(&flat[..4], expected_r.as_slice());
    }

    #[test]
    fn test_window_tensor_preserves_frame_order() {
        let frames = vec![
            Frame::new(vec![10, 10, 10, 255], 1, 1),
            Frame::new(vec![200, 200, 200, 255], 1, 1),
        ];
        let tensor = window_tensor(&frames, 1, 1, &[0.0; 3], &[1.0; 3]).unwrap();
        assert_eq!(tensor.dim(), (1, 2, 3, 1, 1));
        assert!(tensor[[0, 0, 0, 0, 0]] < tensor[[0, 1, 0, 0, 0]]);
    }

    #[test]
    fn test_embedding_tensor_symmetric_range() {
        let black = Frame::new(vec![0, 0, 0, 255], 1, 1);
        let white = Frame::new(vec![255, 255, 255, 255], 1, 1);

        let low = embedding_tensor(&black, 1).unwrap();
        let high = embedding_tensor(&white, 1).unwrap();

        assert!((low[[0, 0, 0, 0]] - (0.0 - 127.5) / 128.0).abs() < 1e-6);
        assert!((high[[0, 0, 0, 0]] - (255.0 - 127.5) / 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_policies_differ_for_same_pixel() {
        // The two normalization policies must not be unified: the same gray
        // pixel maps to different values on each path.
        let gray = Frame::new(vec![128, 128, 128, 255], 1, 1);
        let imagenet = image_tensor(&gray, 1, 1, &IMAGENET_MEAN, &IMAGENET_STD).unwrap();
        let symmetric = embedding_tensor(&gray, 1).unwrap();
        assert!((imagenet[[0, 0, 0, 0]] - symmetric[[0, 0, 0, 0]]).abs() > 0.01);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let frame = Frame::new(vec![1, 2, 3], 2, 2);
        assert!(image_tensor(&frame, 2, 2, &IMAGENET_MEAN, &IMAGENET_STD).is_err());
    }
}
