//! Face-match scoring
//!
//! Compares the document face embedding against per-frame embeddings using
//! cosine similarity and keeps the best-matching frame. Embedding failures on
//! individual frames are skipped, never aborting the pass.

use tracing::warn;

use crate::error::VerifyError;
use crate::frame::Frame;

/// Sentinel score when no candidate frame produced a valid embedding
pub const NO_MATCH_SCORE: f32 = -1.0;

/// Best-match outcome over a set of candidate frames
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MatchResult {
    /// Highest cosine similarity found, or [`NO_MATCH_SCORE`]
    pub score: f32,
    /// Index of the best-matching frame, if any embedding succeeded
    pub best_frame_index: Option<usize>,
}

impl MatchResult {
    /// The sentinel result: no valid embedding pair found
    pub fn none() -> Self {
        Self {
            score: NO_MATCH_SCORE,
            best_frame_index: None,
        }
    }
}

/// Cosine similarity between two vectors, in [-1, 1]. Returns 0 when either
/// norm is zero or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    } else {
        0.0
    }
}

/// Embed each candidate frame and keep the one most similar to `reference`.
/// Per-frame failures are logged and skipped; if every candidate fails the
/// sentinel result is returned.
pub fn best_match<F>(reference: &[f32], candidates: &[Frame], mut embed: F) -> MatchResult
where
    F: FnMut(&Frame) -> Result<Vec<f32>, VerifyError>,
{
    let mut best = MatchResult::none();

    for (index, frame) in candidates.iter().enumerate() {
        let embedding = match embed(frame) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("skipping frame {}: {}", index, e);
                continue;
            }
        };

        let score = cosine_similarity(reference, &embedding);
        if best.best_frame_index.is_none() || score > best.score {
            best = MatchResult {
                score,
                best_frame_index: Some(index),
            };
        }
    }

    best
}
