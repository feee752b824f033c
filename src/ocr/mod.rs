//! Document Text Extraction Layer
//!
//! Reads structured identity-card fields from a document image. The image is
//! expanded into a deterministic set of enhanced variants; a QR fast path is
//! tried across variants first, and only when no barcode matches does the
//! text-recognition path run, one OCR pass per variant, merged by majority
//! vote. Text and barcode recognition are external capabilities injected as
//! traits.

pub mod fields;
pub mod qr;
pub mod variants;
pub mod vote;

pub use fields::{FieldRules, KeywordRule, TextLine};
pub use variants::{generate_variants, ImageEnhancer, ImageVariant};
pub use vote::aggregate;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OcrSettings;
use crate::error::VerifyError;
use crate::frame::Frame;

/// External text-recognition capability: image in, ordered text lines with
/// bounding boxes out.
pub trait TextRecognizer {
    fn recognize(&self, frame: &Frame) -> anyhow::Result<Vec<TextLine>>;
}

/// External barcode-recognition capability: image in, optional raw payload
/// string out.
pub trait BarcodeReader {
    fn read(&self, frame: &Frame) -> anyhow::Result<Option<String>>;
}

/// Structured fields extracted from an identity document. `source` records
/// which extraction path(s) produced the values; it is provenance, not
/// user-visible data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub id_number: String,
    pub full_name: String,
    pub dob: String,
    pub address: String,
    pub origin: String,
    pub source: String,
}

impl Default for DocumentFields {
    fn default() -> Self {
        Self {
            id_number: String::new(),
            full_name: String::new(),
            dob: String::new(),
            address: String::new(),
            origin: String::new(),
            source: "N/A".to_string(),
        }
    }
}

/// Multi-pass document field reader
pub struct DocumentReader {
    settings: OcrSettings,
}

impl DocumentReader {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Extract document fields from a captured document image.
    ///
    /// Never fails outright: recognition errors skip the affected variant,
    /// and when everything fails the result is an empty, low-confidence
    /// field set.
    pub fn extract(
        &self,
        document: &Frame,
        text: &dyn TextRecognizer,
        barcode: &dyn BarcodeReader,
        enhancer: Option<&dyn ImageEnhancer>,
    ) -> DocumentFields {
        let variants = generate_variants(document, enhancer, self.settings.binary_threshold);

        // QR fast path, in variant order, before any OCR.
        for variant in &variants {
            match barcode.read(&variant.frame) {
                Ok(Some(payload)) if !payload.trim().is_empty() => {
                    info!("QR payload found on variant {} ({})", variant.index, variant.label);
                    return match qr::parse_qr_payload(&payload) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            warn!("{}", e);
                            qr::qr_error_fields()
                        }
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    let err = VerifyError::OcrVariant {
                        variant: variant.index,
                        label: variant.label,
                        message: e.to_string(),
                    };
                    warn!("barcode pass skipped: {}", err);
                }
            }
        }

        // OCR path: one pass per variant, failures skip that variant only.
        let mut candidates = Vec::with_capacity(variants.len());
        for variant in &variants {
            match text.recognize(&variant.frame) {
                Ok(lines) => {
                    debug!(
                        "variant {} ({}) recognized {} lines",
                        variant.index,
                        variant.label,
                        lines.len()
                    );
                    candidates.push(fields::parse_lines(&lines, &self.settings.rules));
                }
                Err(e) => {
                    let err = VerifyError::OcrVariant {
                        variant: variant.index,
                        label: variant.label,
                        message: e.to_string(),
                    };
                    warn!("OCR pass skipped: {}", err);
                }
            }
        }

        aggregate(&candidates)
    }
}
