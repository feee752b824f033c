//! Application Configuration
//!
//! Verification policy, model, and OCR settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ocr::fields::FieldRules;
use crate::vision::models::ModelKind;

/// Minimum liveness probability for a verification to pass.
pub const LIVENESS_THRESHOLD: f32 = 0.95;
/// Minimum face-match score for a verification to pass.
pub const MATCH_THRESHOLD: f32 = 0.55;

/// Toolkit settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Pass/fail decision policy
    #[serde(default)]
    pub decision: DecisionPolicy,
    /// Liveness model settings
    #[serde(default)]
    pub liveness: LivenessModelConfig,
    /// Face-embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingModelConfig,
    /// Document text extraction settings
    #[serde(default)]
    pub ocr: OcrSettings,
    /// Model storage settings
    #[serde(default)]
    pub models: ModelStoreConfig,
}

/// Decision thresholds applied by the fusion step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Liveness probability must exceed this to pass
    pub liveness_threshold: f32,
    /// Match score must exceed this to pass
    pub match_threshold: f32,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            liveness_threshold: LIVENESS_THRESHOLD,
            match_threshold: MATCH_THRESHOLD,
        }
    }
}

/// Liveness model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessModelConfig {
    /// Ordered candidate asset names; first loadable one wins
    pub candidates: Vec<String>,
    /// Model input resolution (square)
    pub input_size: u32,
    /// Fixed frame-window length the temporal model expects
    pub frame_window: usize,
    /// Per-channel normalization mean
    pub mean: [f32; 3],
    /// Per-channel normalization std
    pub std: [f32; 3],
    /// Upper bound on a single inference call, in seconds
    pub timeout_secs: u64,
    /// Optional download URL for the model asset
    pub download_url: Option<String>,
}

impl Default for LivenessModelConfig {
    fn default() -> Self {
        Self {
            candidates: ModelKind::Liveness.default_candidates(),
            input_size: 224,
            frame_window: 32,
            mean: crate::vision::preprocess::IMAGENET_MEAN,
            std: crate::vision::preprocess::IMAGENET_STD,
            timeout_secs: 10,
            download_url: None,
        }
    }
}

/// Face-embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelConfig {
    /// Ordered candidate asset names; first loadable one wins
    pub candidates: Vec<String>,
    /// Model input resolution (square)
    pub input_size: u32,
    /// Upper bound on a single inference call, in seconds
    pub timeout_secs: u64,
    /// Optional download URL for the model asset
    pub download_url: Option<String>,
}

impl Default for EmbeddingModelConfig {
    fn default() -> Self {
        Self {
            candidates: ModelKind::Embedding.default_candidates(),
            input_size: 112,
            timeout_secs: 10,
            download_url: None,
        }
    }
}

/// Document text extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Luminance cutoff for the binary-threshold image variant
    pub binary_threshold: u8,
    /// Heuristic field-extraction rule tables
    #[serde(default)]
    pub rules: FieldRules,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary_threshold: 130,
            rules: FieldRules::default(),
        }
    }
}

/// Model storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStoreConfig {
    /// Override for the models directory; per-user data dir when unset
    pub dir: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<VerifyConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: VerifyConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &VerifyConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = VerifyConfig::default();

        assert!((config.decision.liveness_threshold - 0.95).abs() < 1e-6);
        assert!((config.decision.match_threshold - 0.55).abs() < 1e-6);

        assert_eq!(config.liveness.frame_window, 32);
        assert_eq!(config.liveness.input_size, 224);
        assert_eq!(config.embedding.input_size, 112);

        assert_eq!(config.ocr.binary_threshold, 130);
        assert!(!config.ocr.rules.keyword_rules.is_empty());
        assert!(config.models.dir.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = VerifyConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VerifyConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.decision.liveness_threshold,
            parsed.decision.liveness_threshold
        );
        assert_eq!(config.liveness.frame_window, parsed.liveness.frame_window);
        assert_eq!(config.liveness.candidates, parsed.liveness.candidates);
        assert_eq!(config.ocr.binary_threshold, parsed.ocr.binary_threshold);
    }

    #[test]
    fn test_config_with_custom_thresholds() {
        let mut config = VerifyConfig::default();
        config.decision.liveness_threshold = 0.9;
        config.decision.match_threshold = 0.7;
        config.liveness.timeout_secs = 3;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VerifyConfig = toml::from_str(&toml_str).unwrap();

        assert!((parsed.decision.liveness_threshold - 0.9).abs() < 1e-6);
        assert!((parsed.decision.match_threshold - 0.7).abs() < 1e-6);
        assert_eq!(parsed.liveness.timeout_secs, 3);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = VerifyConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.liveness.candidates, loaded.liveness.candidates);
        assert_eq!(config.embedding.input_size, loaded.embedding.input_size);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: VerifyConfig = toml::from_str(
            r#"
            [decision]
            liveness_threshold = 0.99
            match_threshold = 0.6
            "#,
        )
        .unwrap();

        assert!((parsed.decision.liveness_threshold - 0.99).abs() < 1e-6);
        assert_eq!(parsed.liveness.frame_window, 32);
        assert_eq!(parsed.ocr.binary_threshold, 130);
    }
}
