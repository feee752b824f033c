//! Fixed-length frame-window sampling
//!
//! The temporal liveness model consumes exactly N frames regardless of how
//! long the user recorded. Longer captures are uniformly downsampled, shorter
//! ones padded by repeating the last frame, and an empty capture degrades to
//! blank placeholder frames rather than an error.

use tracing::debug;

use super::Frame;

/// Indices selected when downsampling `len` frames to `target`.
///
/// Uses floating-point step accumulation truncated per iteration. Integer
/// division would cluster the selection at the end of the span.
fn sample_indices(len: usize, target: usize) -> Vec<usize> {
    let step = len as f64 / target as f64;
    let mut cursor = 0.0f64;
    let mut indices = Vec::with_capacity(target);
    for _ in 0..target {
        indices.push((cursor as usize).min(len - 1));
        cursor += step;
    }
    indices
}

/// Map an arbitrary-length frame sequence onto a window of exactly `target`
/// frames.
///
/// `blank_resolution` is the (width, height) used for placeholder frames when
/// the input is empty — the degraded-but-non-failing path.
pub fn sample_window(frames: &[Frame], target: usize, blank_resolution: (u32, u32)) -> Vec<Frame> {
    if frames.len() == target {
        return frames.to_vec();
    }

    if frames.is_empty() {
        debug!("no frames captured, padding window with {} blank frames", target);
        let (w, h) = blank_resolution;
        return (0..target).map(|_| Frame::blank(w, h)).collect();
    }

    if frames.len() > target {
        let indices = sample_indices(frames.len(), target);
        debug!(
            "downsampled {} frames to {} (last selected index {:?})",
            frames.len(),
            target,
            indices.last()
        );
        return indices.into_iter().map(|i| frames[i].clone()).collect();
    }

    // Fewer frames than the window: keep all, repeat the last one.
    let mut window = frames.to_vec();
    let last = frames[frames.len() - 1].clone();
    while window.len() < target {
        window.push(last.clone());
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked_frame(mark: u8) -> Frame {
        Frame::new(vec![mark; 4], 1, 1)
    }

    fn marks(window: &[Frame]) -> Vec<u8> {
        window.iter().map(|f| f.data[0]).collect()
    }

    #[test]
    fn test_window_length_invariant() {
        for len in [0usize, 1, 5, 31, 32, 33, 40, 100, 500] {
            let frames: Vec<Frame> = (0..len).map(|i| marked_frame((i % 250) as u8)).collect();
            let window = sample_window(&frames, 32, (8, 8));
            assert_eq!(window.len(), 32, "input length {}", len);
        }
    }

    #[test]
    fn test_exact_length_passes_through() {
        let frames: Vec<Frame> = (0..32).map(|i| marked_frame(i as u8)).collect();
        let window = sample_window(&frames, 32, (8, 8));
        assert_eq!(marks(&window), (0..32).collect::<Vec<u8>>());
    }

    #[test]
    fn test_downsample_indices_non_decreasing_and_in_range() {
        for (len, target) in [(40usize, 32usize), (100, 32), (33, 32), (1000, 7)] {
            let indices = sample_indices(len, target);
            assert_eq!(indices.len(), target);
            assert_eq!(indices[0], 0);
            assert!(indices.windows(2).all(|p| p[0] <= p[1]));
            assert!(*indices.last().unwrap() < len);
        }
    }

    #[test]
    fn test_downsample_40_to_32_spans_without_trailing_repeats() {
        let frames: Vec<Frame> = (0..40).map(|i| marked_frame(i as u8)).collect();
        let window = sample_window(&frames, 32, (8, 8));
        let selected = marks(&window);

        // Covers the source span, ending near index 39.
        assert_eq!(selected[0], 0);
        assert!(*selected.last().unwrap() >= 38);

        // Uniform sampling never duplicates adjacent frames here; padding would.
        let tail = &selected[selected.len() - 4..];
        assert!(tail.windows(2).all(|p| p[0] != p[1]), "tail was {:?}", tail);
    }

    #[test]
    fn test_short_input_pads_with_last_frame() {
        let frames: Vec<Frame> = (0..5).map(|i| marked_frame(i as u8)).collect();
        let window = sample_window(&frames, 32, (8, 8));
        let selected = marks(&window);

        assert_eq!(&selected[..5], &[0, 1, 2, 3, 4]);
        assert!(selected[5..].iter().all(|&m| m == 4));
    }

    #[test]
    fn test_empty_input_yields_blank_frames() {
        let window = sample_window(&[], 32, (224, 224));
        assert_eq!(window.len(), 32);
        for frame in &window {
            assert_eq!(frame.dimensions(), (224, 224));
            assert!(frame.data.iter().all(|&b| b == 0));
        }
    }
}
