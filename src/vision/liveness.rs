//! Temporal liveness classification engine
//!
//! Wraps the liveness model: two positional inputs (document tensor, then
//! frame-window tensor), output a tuple whose first element is the liveness
//! probability. The model also emits auxiliary scalars; only element 0 feeds
//! the decision, element 1 is retained for diagnostics, and the model's own
//! match output is ignored in favor of the embedding-based score.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LivenessModelConfig;
use crate::error::VerifyError;
use crate::frame::Frame;
use crate::vision::models::{
    load_first_candidate, tensor_data, EngineState, InferenceWorker, ModelKind, ModelManager,
};
use crate::vision::preprocess;

/// Raw output of one liveness inference
#[derive(Debug, Clone, Copy)]
pub struct LivenessOutput {
    /// Probability that the frame window shows a live, present person
    pub probability: f32,
    /// Auxiliary quality scalar, when the model emits one
    pub quality: Option<f32>,
}

/// Liveness inference engine with a one-shot lazy load
pub struct LivenessEngine {
    manager: ModelManager,
    config: LivenessModelConfig,
    worker: Option<InferenceWorker>,
    state: EngineState,
}

impl LivenessEngine {
    /// Create an engine; the model is loaded on first use
    pub fn new(manager: ModelManager, config: LivenessModelConfig) -> Self {
        Self {
            manager,
            config,
            worker: None,
            state: EngineState::NotLoaded,
        }
    }

    /// Current load state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Try the candidate chain once. After a failed attempt the engine stays
    /// disabled for the session.
    pub fn load(&mut self) -> Result<(), VerifyError> {
        match self.state {
            EngineState::Loaded => Ok(()),
            EngineState::Unavailable => Err(VerifyError::ModelLoad(
                "liveness model is unavailable for this session".to_string(),
            )),
            EngineState::NotLoaded => {
                match load_first_candidate(&self.manager, &self.config.candidates, ModelKind::Liveness)
                {
                    Ok(session) => {
                        self.worker = Some(InferenceWorker::spawn(session, ModelKind::Liveness));
                        self.state = EngineState::Loaded;
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Disabling liveness engine: {}", e);
                        self.state = EngineState::Unavailable;
                        Err(VerifyError::ModelLoad(e.to_string()))
                    }
                }
            }
        }
    }

    /// Run the liveness model over a document image and a frame window
    pub fn infer(
        &mut self,
        document: &Frame,
        window: &[Frame],
    ) -> Result<LivenessOutput, VerifyError> {
        if window.is_empty() {
            return Err(VerifyError::Inference("empty frame window".to_string()));
        }

        self.load()?;
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| VerifyError::ModelLoad("liveness engine not loaded".to_string()))?;

        let size = self.config.input_size;
        let document_tensor =
            preprocess::image_tensor(document, size, size, &self.config.mean, &self.config.std)?;
        let window_tensor =
            preprocess::window_tensor(window, size, size, &self.config.mean, &self.config.std)?;

        let outputs = worker
            .run(
                vec![tensor_data(document_tensor), tensor_data(window_tensor)],
                Duration::from_secs(self.config.timeout_secs),
            )
            .map_err(|e| VerifyError::Inference(format!("liveness: {}", e)))?;

        let probability = outputs
            .first()
            .and_then(|(_, data)| data.first())
            .copied()
            .ok_or_else(|| {
                VerifyError::Inference("liveness model returned no probability scalar".to_string())
            })?;
        let quality = outputs.get(1).and_then(|(_, data)| data.first()).copied();

        debug!(
            "liveness inference: probability={:.4}, quality={:?}",
            probability, quality
        );

        Ok(LivenessOutput {
            probability,
            quality,
        })
    }
}
