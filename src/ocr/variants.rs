//! Image variants for OCR robustness
//!
//! Produces a deterministic ordered set of visually-enhanced copies of a
//! document image. Order is significant downstream: the QR fast path checks
//! variants in order, and voting breaks ties by first occurrence. Each
//! primitive transform is pure and returns a new buffer.

use tracing::{debug, warn};

use crate::frame::Frame;

/// Optional higher-quality external cleanup pipeline for the "cleaned"
/// variant. Any failure degrades to the built-in fallback chain and never
/// escapes the generator.
pub trait ImageEnhancer {
    fn enhance(&self, frame: &Frame) -> anyhow::Result<Frame>;
}

/// A derived document image with a stable generation-order index
#[derive(Debug, Clone)]
pub struct ImageVariant {
    /// Position in the canonical generation order
    pub index: usize,
    /// Human-readable variant name for logs and errors
    pub label: &'static str,
    pub frame: Frame,
}

/// Generate the canonical ordered variant set:
/// original, cleaned, two contrast/brightness combos, sharpened grayscale,
/// and binary-threshold grayscale.
pub fn generate_variants(
    original: &Frame,
    enhancer: Option<&dyn ImageEnhancer>,
    threshold_cutoff: u8,
) -> Vec<ImageVariant> {
    let gray = grayscale(original);

    let ordered: Vec<(&'static str, Frame)> = vec![
        ("original", original.clone()),
        ("cleaned", cleaned(original, enhancer)),
        ("contrast-1.6", contrast_brightness(&gray, 1.6, -30.0)),
        ("contrast-2.0", contrast_brightness(&gray, 2.0, -50.0)),
        ("sharpened-grayscale", sharpen(&gray)),
        (
            "threshold-grayscale",
            binary_threshold(&gray, threshold_cutoff),
        ),
    ];

    debug!("generated {} variants for OCR", ordered.len());

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (label, frame))| ImageVariant {
            index,
            label,
            frame,
        })
        .collect()
}

/// Cleaned variant: external enhancer when available, otherwise
/// grayscale -> contrast(1.5, -40) -> sharpen.
fn cleaned(frame: &Frame, enhancer: Option<&dyn ImageEnhancer>) -> Frame {
    if let Some(enhancer) = enhancer {
        match enhancer.enhance(frame) {
            Ok(enhanced) => return enhanced,
            Err(e) => warn!("external enhancer failed, using fallback chain: {}", e),
        }
    }
    sharpen(&contrast_brightness(&grayscale(frame), 1.5, -40.0))
}

/// Desaturate to grayscale using standard luminance weights
pub fn grayscale(frame: &Frame) -> Frame {
    let mut data = frame.data.clone();
    for chunk in data.chunks_exact_mut(4) {
        let gray = (0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32)
            as u8;
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
        // Alpha unchanged
    }
    Frame::new(data, frame.width, frame.height)
}

/// Per-channel affine transform `value' = contrast * value + brightness`,
/// clamped to [0, 255]
pub fn contrast_brightness(frame: &Frame, contrast: f32, brightness: f32) -> Frame {
    let mut data = frame.data.clone();
    for chunk in data.chunks_exact_mut(4) {
        for channel in chunk.iter_mut().take(3) {
            let adjusted = (*channel as f32 * contrast + brightness).clamp(0.0, 255.0);
            *channel = adjusted as u8;
        }
        // Alpha unchanged
    }
    Frame::new(data, frame.width, frame.height)
}

/// 3x3 sharpen convolution, kernel [[0,-1,0],[-1,5,-1],[0,-1,0]]. Border
/// pixels pass through unmodified; interior output clamped to [0, 255].
pub fn sharpen(frame: &Frame) -> Frame {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let src = &frame.data;
    let mut out = src.clone();

    if w < 3 || h < 3 || !frame.is_well_formed() {
        return Frame::new(out, frame.width, frame.height);
    }

    const KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = (y * w + x) * 4;
            for c in 0..3 {
                let mut sum = 0.0f32;
                let mut k = 0;
                for ky in 0..3usize {
                    for kx in 0..3usize {
                        let src_idx = ((y + ky - 1) * w + (x + kx - 1)) * 4 + c;
                        sum += src[src_idx] as f32 * KERNEL[k];
                        k += 1;
                    }
                }
                out[idx + c] = sum.clamp(0.0, 255.0).round() as u8;
            }
        }
    }

    Frame::new(out, frame.width, frame.height)
}

/// Binary threshold on mean-RGB luminance: white above `cutoff`, black below
pub fn binary_threshold(frame: &Frame, cutoff: u8) -> Frame {
    let mut data = frame.data.clone();
    for chunk in data.chunks_exact_mut(4) {
        let luminance = (chunk[0] as u32 + chunk[1] as u32 + chunk[2] as u32) / 3;
        let value = if luminance > cutoff as u32 { 255 } else { 0 };
        chunk[0] = value;
        chunk[1] = value;
        chunk[2] = value;
        // Alpha unchanged
    }
    Frame::new(data, frame.width, frame.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(r: u8, g: u8, b: u8, width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[r, g, b, 255]);
        }
        Frame::new(data, width, height)
    }

    struct FailingEnhancer;
    impl ImageEnhancer for FailingEnhancer {
        fn enhance(&self, _frame: &Frame) -> anyhow::Result<Frame> {
            anyhow::bail!("external pipeline unavailable")
        }
    }

    struct MarkerEnhancer;
    impl ImageEnhancer for MarkerEnhancer {
        fn enhance(&self, frame: &Frame) -> anyhow::Result<Frame> {
            Ok(solid_frame(7, 7, 7, frame.width, frame.height))
        }
    }

    #[test]
    fn test_variant_count_and_order() {
        let frame = solid_frame(100, 150, 200, 4, 4);
        let variants = generate_variants(&frame, None, 130);

        assert_eq!(variants.len(), 6);
        let labels: Vec<&str> = variants.iter().map(|v| v.label).collect();
        assert_eq!(
            labels,
            vec![
                "original",
                "cleaned",
                "contrast-1.6",
                "contrast-2.0",
                "sharpened-grayscale",
                "threshold-grayscale"
            ]
        );
        for (i, v) in variants.iter().enumerate() {
            assert_eq!(v.index, i);
        }
    }

    #[test]
    fn test_original_variant_is_untouched() {
        let frame = solid_frame(100, 150, 200, 2, 2);
        let variants = generate_variants(&frame, None, 130);
        assert_eq!(variants[0].frame.data, frame.data);
    }

    #[test]
    fn test_enhancer_failure_falls_back_without_shrinking_list() {
        let frame = solid_frame(100, 150, 200, 4, 4);
        let variants = generate_variants(&frame, Some(&FailingEnhancer), 130);
        assert_eq!(variants.len(), 6);
        // The fallback chain output is grayscale: channels equal.
        let cleaned = &variants[1].frame;
        assert_eq!(cleaned.data[0], cleaned.data[1]);
        assert_eq!(cleaned.data[1], cleaned.data[2]);
    }

    #[test]
    fn test_enhancer_success_is_used() {
        let frame = solid_frame(100, 150, 200, 2, 2);
        let variants = generate_variants(&frame, Some(&MarkerEnhancer), 130);
        assert_eq!(variants[1].frame.data[0], 7);
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let gray = grayscale(&solid_frame(255, 0, 0, 1, 1));
        // 0.299 * 255 = 76.245
        assert_eq!(gray.data[0], 76);
        assert_eq!(gray.data[1], 76);
        assert_eq!(gray.data[2], 76);
        assert_eq!(gray.data[3], 255);
    }

    #[test]
    fn test_contrast_brightness_affine_and_clamped() {
        let frame = Frame::new(vec![100, 128, 200, 255], 1, 1);
        let adjusted = contrast_brightness(&frame, 2.0, -50.0);
        // 100*2-50=150, 128*2-50=206, 200*2-50=350 -> 255
        assert_eq!(adjusted.data[0], 150);
        assert_eq!(adjusted.data[1], 206);
        assert_eq!(adjusted.data[2], 255);
        assert_eq!(adjusted.data[3], 255);
    }

    #[test]
    fn test_sharpen_preserves_borders_and_flat_interior() {
        // A flat image sharpens to itself: 5v - 4v = v.
        let frame = solid_frame(90, 90, 90, 5, 5);
        let sharpened = sharpen(&frame);
        assert_eq!(sharpened.data, frame.data);
    }

    #[test]
    fn test_sharpen_boosts_center_of_bright_spot() {
        let mut frame = solid_frame(50, 50, 50, 3, 3);
        // Brighten the center pixel.
        let center = (1 * 3 + 1) * 4;
        frame.data[center] = 150;
        frame.data[center + 1] = 150;
        frame.data[center + 2] = 150;

        let sharpened = sharpen(&frame);
        // 5*150 - 4*50 = 550 -> clamped to 255
        assert_eq!(sharpened.data[center], 255);
        // Border pixel passes through unmodified.
        assert_eq!(sharpened.data[0], 50);
    }

    #[test]
    fn test_binary_threshold_cutoff() {
        let bright = binary_threshold(&solid_frame(140, 140, 140, 1, 1), 130);
        assert_eq!(bright.data[0], 255);

        let dark = binary_threshold(&solid_frame(120, 120, 120, 1, 1), 130);
        assert_eq!(dark.data[0], 0);

        // Exactly at the cutoff is black (strictly-greater comparison).
        let edge = binary_threshold(&solid_frame(130, 130, 130, 1, 1), 130);
        assert_eq!(edge.data[0], 0);
    }

    #[test]
    fn test_tiny_image_sharpen_is_identity() {
        let frame = solid_frame(10, 20, 30, 2, 2);
        let sharpened = sharpen(&frame);
        assert_eq!(sharpened.data, frame.data);
    }
}
