//! Error taxonomy for the verification core
//!
//! Every failure in this crate degrades to one of these variants or to a
//! low-confidence annotation on the result; nothing here aborts the process.

use thiserror::Error;

/// Typed failures surfaced by the verification and extraction pipelines.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Model asset missing, corrupt, or unsupported. The owning engine is
    /// disabled for the rest of the session.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Malformed input, unexpected output shape, or a runtime failure from
    /// an inference call. Affects that call only.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Per-image embedding failure. Callers skip the item and continue.
    #[error("embedding extraction failed: {0}")]
    Embedding(String),

    /// Recognition failure on a single image variant. The variant is
    /// skipped; remaining variants still run.
    #[error("recognition failed on variant {variant} ({label}): {message}")]
    OcrVariant {
        variant: usize,
        label: &'static str,
        message: String,
    },

    /// Malformed QR payload.
    #[error("QR payload parse failed: {0}")]
    Parse(String),
}
