//! Face-embedding extraction engine
//!
//! Wraps the single-image embedding model: one `(1, 3, S, S)` input with
//! symmetric normalization, one fixed-length float vector out. Failures are
//! per-image; multi-frame matching passes skip the frame and continue.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EmbeddingModelConfig;
use crate::error::VerifyError;
use crate::frame::Frame;
use crate::vision::models::{
    load_first_candidate, tensor_data, EngineState, InferenceWorker, ModelKind, ModelManager,
};
use crate::vision::preprocess;

/// Embedding inference engine with a one-shot lazy load
pub struct EmbeddingEngine {
    manager: ModelManager,
    config: EmbeddingModelConfig,
    worker: Option<InferenceWorker>,
    state: EngineState,
}

impl EmbeddingEngine {
    /// Create an engine; the model is loaded on first use
    pub fn new(manager: ModelManager, config: EmbeddingModelConfig) -> Self {
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
                "embedding model is unavailable for this session".to_string(),
            )),
            EngineState::NotLoaded => {
                match load_first_candidate(
                    &self.manager,
                    &self.config.candidates,
                    ModelKind::Embedding,
                ) {
                    Ok(session) => {
                        self.worker = Some(InferenceWorker::spawn(session, ModelKind::Embedding));
                        self.state = EngineState::Loaded;
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Disabling embedding engine: {}", e);
                        self.state = EngineState::Unavailable;
                        Err(VerifyError::ModelLoad(e.to_string()))
                    }
                }
            }
        }
    }

    /// Extract the raw embedding vector for one face image
    pub fn embed(&mut self, image: &Frame) -> Result<Vec<f32>, VerifyError> {
        self.load()
            .map_err(|e| VerifyError::Embedding(e.to_string()))?;
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| VerifyError::Embedding("embedding engine not loaded".to_string()))?;

        let tensor = preprocess::embedding_tensor(image, self.config.input_size)
            .map_err(|e| VerifyError::Embedding(e.to_string()))?;

        let outputs = worker
            .run(
                vec![tensor_data(tensor)],
                Duration::from_secs(self.config.timeout_secs),
            )
            .map_err(|e| VerifyError::Embedding(e.to_string()))?;

        let embedding = outputs
            .into_iter()
            .next()
            .map(|(_, data)| data)
            .filter(|data| !data.is_empty())
            .ok_or_else(|| {
                VerifyError::Embedding("embedding model returned an empty vector".to_string())
            })?;

        debug!("extracted {}-dim face embedding", embedding.len());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();
        let mut engine = EmbeddingEngine::new(manager, EmbeddingModelConfig::default());

        let result = engine.embed(&Frame::blank(112, 112));
        assert!(matches!(result, Err(VerifyError::Embedding(_))));
        assert_eq!(engine.state(), EngineState::Unavailable);

        // Per-item failure: the caller can keep calling, each fails fast.
        let again = engine.embed(&Frame::blank(112, 112));
        assert!(matches!(again, Err(VerifyError::Embedding(_))));
    }
}
