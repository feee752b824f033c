//! Model management for ONNX Runtime
//!
//! Handles locating, caching, downloading, and loading of the verification
//! models, plus the worker threads that serialize inference calls into a
//! loaded session and bound their duration.

use anyhow::{Context, Result};
use crossbeam_channel::{RecvTimeoutError, Sender};
use futures_util::StreamExt;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Model identifier for the verification engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Temporal liveness classifier (document + frame window)
    Liveness,
    /// Per-image face-embedding extractor
    Embedding,
}

impl ModelKind {
    /// Display name for status and progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Liveness => "Liveness Classifier",
            ModelKind::Embedding => "Face Embedding",
        }
    }

    /// Default ordered list of packaged asset names tried at load.
    /// The first name that resolves to a usable file wins.
    pub fn default_candidates(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ModelKind::Liveness => &["ekyc_liveness.onnx", "liveness.onnx"],
            ModelKind::Embedding => &["face_embedding.onnx", "face_recognition_s.onnx"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: Option<String>,
    pub downloaded_at: String,
}

/// Locates and caches model assets in a models directory
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager rooted at the per-user data directory
    pub fn new() -> Result<Self> {
        let proj_dirs = directories::ProjectDirs::from("com", "ekyctoolkit", "EkycToolkit")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let models_dir = proj_dirs.data_dir().join("models");
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Create a model manager with a custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Resolve the first candidate asset name that exists as a non-empty file
    pub fn locate(&self, candidates: &[String]) -> Option<PathBuf> {
        for name in candidates {
            let path = self.models_dir.join(name);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() > 0 => return Some(path),
                Ok(_) => warn!("Model file {:?} is empty, skipping", path),
                Err(_) => {}
            }
        }
        None
    }

    /// Check whether any candidate for the given asset list is available
    pub fn is_available(&self, candidates: &[String]) -> bool {
        self.locate(candidates).is_some()
    }

    /// Download a model file from `url` into the models directory.
    /// Verifies `expected_sha256` when provided, then updates the manifest.
    pub fn download_model(
        &self,
        url: &str,
        filename: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf> {
        let path = self.models_dir.join(filename);

        if std::env::var("EKYC_TOOLKIT_OFFLINE").is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        info!("Downloading model from {}", url);

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(self.download_file_async(url, &path, expected_sha256))?;

        self.update_manifest_for(filename)?;
        info!("Successfully downloaded {}", filename);
        Ok(path)
    }

    async fn download_file_async(
        &self,
        url: &str,
        path: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(url)
            .send()
            .await
            .context("Failed to send download request")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status {}: {}", response.status(), url);
        }

        let total_size = response.content_length();
        debug!("Download size: {:?} bytes", total_size);

        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            file.write_all(&chunk).context("Failed to write to temp file")?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
        }
        debug!("Downloaded {} bytes", downloaded);

        file.flush().context("Failed to flush temp file")?;
        drop(file);

        let hash = format!("{:x}", hasher.finalize());
        if let Some(expected) = expected_sha256 {
            if hash != expected {
                std::fs::remove_file(&temp_path).ok();
                anyhow::bail!("Checksum mismatch: expected {}, got {}", expected, hash);
            }
            info!("Checksum verified");
        }

        std::fs::rename(&temp_path, path)
            .context("Failed to move downloaded file to final location")?;

        Ok(())
    }

    fn update_manifest_for(&self, filename: &str) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();

        let path = self.models_dir.join(filename);
        let metadata = std::fs::metadata(&path)?;
        let hash = {
            let data = std::fs::read(&path)?;
            let mut hasher = Sha256::new();
            hasher.update(&data);
            format!("{:x}", hasher.finalize())
        };

        let info = ModelInfo {
            filename: filename.to_string(),
            size_bytes: metadata.len(),
            sha256: Some(hash),
            downloaded_at: unix_timestamp_now(),
        };

        if let Some(existing) = manifest
            .models
            .iter_mut()
            .find(|m| m.filename == info.filename)
        {
            *existing = info;
        } else {
            manifest.models.push(info);
        }

        self.save_manifest(&manifest)
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(ModelManifest::default())
        }
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    /// Get input names
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Get output names
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

/// Whether an engine's one-shot load has happened, and how it went.
/// Once `Unavailable`, an engine stays disabled for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No load attempted yet; the first inference call triggers one.
    NotLoaded,
    Loaded,
    Unavailable,
}

/// Try an ordered list of candidate asset names, loading the first that works.
pub fn load_first_candidate(
    manager: &ModelManager,
    candidates: &[String],
    kind: ModelKind,
) -> Result<OnnxSession> {
    for name in candidates {
        let path = manager.models_dir().join(name);
        if !path.exists() {
            debug!("{} candidate {:?} not present", kind.display_name(), path);
            continue;
        }
        match OnnxSession::new(&path) {
            Ok(session) => return Ok(session),
            Err(e) => warn!(
                "{} candidate {:?} failed to load: {}",
                kind.display_name(),
                path,
                e
            ),
        }
    }
    anyhow::bail!(
        "{}: no loadable model among candidates {:?} in {:?}",
        kind.display_name(),
        candidates,
        manager.models_dir()
    )
}

/// A flat tensor: shape plus row-major (channel-major per frame) data.
pub type TensorData = (Vec<usize>, Vec<f32>);

/// Flatten a freshly built (standard-layout) ndarray tensor into shape + data
pub fn tensor_data<D: ndarray::Dimension>(array: ndarray::Array<f32, D>) -> TensorData {
    let shape = array.shape().to_vec();
    let (data, _) = array.into_raw_vec_and_offset();
    (shape, data)
}

/// Failure modes of a bounded inference call.
#[derive(Debug)]
pub enum WorkerError {
    /// The call did not complete within the configured timeout.
    TimedOut(Duration),
    /// The worker thread is gone (panicked or shut down).
    Disconnected,
    /// The session reported an error for this call.
    Run(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::TimedOut(timeout) => {
                write!(f, "inference timed out after {:?}", timeout)
            }
            WorkerError::Disconnected => write!(f, "inference worker is no longer running"),
            WorkerError::Run(message) => write!(f, "{}", message),
        }
    }
}

struct InferenceRequest {
    inputs: Vec<TensorData>,
    reply: Sender<std::result::Result<Vec<TensorData>, String>>,
}

/// Owns a loaded session on a dedicated thread and serializes inference
/// calls into it through a request queue. Each call is bounded by a timeout;
/// a timed-out call surfaces an error while the worker finishes (and
/// discards) the stale reply in the background.
pub struct InferenceWorker {
    requests: Sender<InferenceRequest>,
    kind: ModelKind,
}

impl InferenceWorker {
    /// Move a session onto its worker thread
    pub fn spawn(session: OnnxSession, kind: ModelKind) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<InferenceRequest>();
        let thread_name = format!("{}-inference", match kind {
            ModelKind::Liveness => "liveness",
            ModelKind::Embedding => "embedding",
        });

        let builder = std::thread::Builder::new().name(thread_name);
        let spawned = builder.spawn(move || {
            let mut session = session;
            while let Ok(request) = rx.recv() {
                let result = run_session(&mut session, request.inputs);
                // Receiver may have timed out and gone away; nothing to do.
                let _ = request.reply.send(result);
            }
        });
        if let Err(e) = spawned {
            warn!("Failed to spawn inference worker thread: {}", e);
        }

        Self { requests: tx, kind }
    }

    /// Run one inference with positional inputs, waiting at most `timeout`
    pub fn run(
        &self,
        inputs: Vec<TensorData>,
        timeout: Duration,
    ) -> std::result::Result<Vec<TensorData>, WorkerError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.requests
            .send(InferenceRequest {
                inputs,
                reply: reply_tx,
            })
            .map_err(|_| WorkerError::Disconnected)?;

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(outputs)) => Ok(outputs),
            Ok(Err(message)) => Err(WorkerError::Run(message)),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "{} inference exceeded {:?}, abandoning call",
                    self.kind.display_name(),
                    timeout
                );
                Err(WorkerError::TimedOut(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

/// Execute one positional inference call against the session.
fn run_session(
    session: &mut OnnxSession,
    inputs: Vec<TensorData>,
) -> std::result::Result<Vec<TensorData>, String> {
    if inputs.len() != session.input_names.len() {
        return Err(format!(
            "model expects {} inputs, got {}",
            session.input_names.len(),
            inputs.len()
        ));
    }

    let mut values = Vec::with_capacity(inputs.len());
    for (shape, data) in inputs {
        // from_array wants a fixed-size shape array
        let value = match shape.len() {
            1 => Value::from_array(([shape[0]], data)),
            2 => Value::from_array(([shape[0], shape[1]], data)),
            3 => Value::from_array(([shape[0], shape[1], shape[2]], data)),
            4 => Value::from_array(([shape[0], shape[1], shape[2], shape[3]], data)),
            5 => Value::from_array((
                [shape[0], shape[1], shape[2], shape[3], shape[4]],
                data,
            )),
            n => return Err(format!("unsupported tensor rank {}", n)),
        }
        .map_err(|e| e.to_string())?;
        values.push(value);
    }

    let output_names = session.output_names.clone();
    let outputs = match values.len() {
        1 => {
            let a = values.remove(0);
            session
                .session
                .run(ort::inputs![a])
                .map_err(|e| e.to_string())?
        }
        2 => {
            let a = values.remove(0);
            let b = values.remove(0);
            session
                .session
                .run(ort::inputs![a, b])
                .map_err(|e| e.to_string())?
        }
        n => return Err(format!("unsupported input arity {}", n)),
    };

    let mut extracted = Vec::with_capacity(output_names.len());
    for name in &output_names {
        let (shape, data) = outputs[name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| e.to_string())?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        extracted.push((shape, data.to_vec()));
    }

    Ok(extracted)
}

/// Current timestamp as a Unix-seconds string (lightweight alternative to chrono)
fn unix_timestamp_now() -> String {
    use std::time::SystemTime;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    format!("{}", now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_candidates() {
        assert_eq!(
            ModelKind::Liveness.default_candidates()[0],
            "ekyc_liveness.onnx"
        );
        assert_eq!(
            ModelKind::Embedding.default_candidates()[0],
            "face_embedding.onnx"
        );
    }

    #[test]
    fn test_locate_prefers_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        std::fs::write(dir.path().join("liveness.onnx"), b"model-bytes").unwrap();

        let candidates = ModelKind::Liveness.default_candidates();
        let located = manager.locate(&candidates).unwrap();
        assert_eq!(located, dir.path().join("liveness.onnx"));

        // Preferred name now appears; it wins over the fallback.
        std::fs::write(dir.path().join("ekyc_liveness.onnx"), b"model-bytes").unwrap();
        let located = manager.locate(&candidates).unwrap();
        assert_eq!(located, dir.path().join("ekyc_liveness.onnx"));
    }

    #[test]
    fn test_locate_skips_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        std::fs::write(dir.path().join("liveness.onnx"), b"").unwrap();
        assert!(manager.locate(&ModelKind::Liveness.default_candidates()).is_none());
        assert!(!manager.is_available(&ModelKind::Liveness.default_candidates()));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        let manifest = ModelManifest {
            models: vec![ModelInfo {
                filename: "liveness.onnx".to_string(),
                size_bytes: 42,
                sha256: None,
                downloaded_at: "0".to_string(),
            }],
        };
        manager.save_manifest(&manifest).unwrap();

        let loaded = manager.load_manifest().unwrap();
        assert_eq!(loaded.models.len(), 1);
        assert_eq!(loaded.models[0].filename, "liveness.onnx");
    }

    #[test]
    fn test_load_first_candidate_fails_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();
        let result = load_first_candidate(
            &manager,
            &ModelKind::Embedding.default_candidates(),
            ModelKind::Embedding,
        );
        assert!(result.is_err());
    }
}
