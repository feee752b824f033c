//! Verification Layer
//!
//! Orchestrates the liveness and face-match inference paths and fuses their
//! scores into a pass/fail verdict. The two engines run behind per-engine
//! locks: calls into one engine are serialized, while liveness and embedding
//! may run concurrently with each other.

pub mod embedding;
pub mod liveness;
pub mod matching;
pub mod models;
pub mod preprocess;

pub use embedding::EmbeddingEngine;
pub use liveness::{LivenessEngine, LivenessOutput};
pub use matching::{best_match, cosine_similarity, MatchResult, NO_MATCH_SCORE};
pub use models::{EngineState, ModelKind, ModelManager};

use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DecisionPolicy, VerifyConfig};
use crate::error::VerifyError;
use crate::frame::{sample_window, Frame};

/// Outcome of one verification run. `passed` is a pure function of the two
/// scores and the decision policy; it is computed once and never mutated
/// independently.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationResult {
    /// Model-estimated probability of a live, present person
    pub liveness_probability: f32,
    /// Best cosine similarity between the document face and a frame face,
    /// or the sentinel -1 when no frame produced an embedding
    pub matching_score: f32,
    /// Joint threshold verdict
    pub passed: bool,
    /// Auxiliary quality scalar from the liveness model, when emitted
    pub quality: Option<f32>,
    /// Frame index that produced the best match
    pub best_frame_index: Option<usize>,
}

/// Threshold fusion of the two scores into a verdict
pub fn decision_passed(liveness: f32, matching: f32, policy: &DecisionPolicy) -> bool {
    liveness > policy.liveness_threshold && matching > policy.match_threshold
}

/// End-to-end liveness + face-match pipeline
pub struct VerificationPipeline {
    liveness: Mutex<LivenessEngine>,
    embedder: Mutex<EmbeddingEngine>,
    policy: DecisionPolicy,
    frame_window: usize,
    window_resolution: (u32, u32),
}

impl VerificationPipeline {
    /// Build a pipeline from configuration. Models load lazily on first use.
    pub fn new(config: &VerifyConfig, manager: ModelManager) -> Self {
        let size = config.liveness.input_size;
        Self {
            liveness: Mutex::new(LivenessEngine::new(
                manager.clone(),
                config.liveness.clone(),
            )),
            embedder: Mutex::new(EmbeddingEngine::new(manager, config.embedding.clone())),
            policy: config.decision.clone(),
            frame_window: config.liveness.frame_window,
            window_resolution: (size, size),
        }
    }

    /// Decide whether `frames` is a live, matching presentation of the person
    /// on `document`.
    ///
    /// A liveness failure fails the call; embedding failures degrade to the
    /// sentinel match score so a flaky embedding path cannot abort the
    /// decision.
    pub fn verify(
        &self,
        document: &Frame,
        frames: &[Frame],
    ) -> Result<VerificationResult, VerifyError> {
        let start = Instant::now();

        let window = sample_window(frames, self.frame_window, self.window_resolution);

        let liveness = self.liveness.lock().infer(document, &window)?;

        let match_result = {
            let mut embedder = self.embedder.lock();
            match embedder.embed(document) {
                Ok(reference) => {
                    best_match(&reference, &window, |frame| embedder.embed(frame))
                }
                Err(e) => {
                    warn!("document embedding failed, match degraded to sentinel: {}", e);
                    MatchResult::none()
                }
            }
        };

        let passed = decision_passed(liveness.probability, match_result.score, &self.policy);

        debug!(
            "verification complete in {:?}: liveness={:.4}, match={:.4}, passed={}",
            start.elapsed(),
            liveness.probability,
            match_result.score,
            passed
        );
        if !passed {
            info!(
                "verification rejected (liveness={:.4} vs >{:.2}, match={:.4} vs >{:.2})",
                liveness.probability,
                self.policy.liveness_threshold,
                match_result.score,
                self.policy.match_threshold
            );
        }

        Ok(VerificationResult {
            liveness_probability: liveness.probability,
            matching_score: match_result.score,
            passed,
            quality: liveness.quality,
            best_frame_index: match_result.best_frame_index,
        })
    }
}
