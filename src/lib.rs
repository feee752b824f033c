//! EkycToolkit - On-device identity verification core
//!
//! Decides whether a captured video is a live, matching presentation of the
//! person on an identity document, and extracts structured text fields from
//! the document image under noisy OCR conditions.
//!
//! The crate exposes three cooperating pieces:
//! - [`vision::VerificationPipeline`]: frame windowing, tensor
//!   preprocessing, liveness and face-embedding inference, cosine-similarity
//!   matching, and threshold decision fusion.
//! - [`ocr::DocumentReader`]: image-variant generation, a QR fast path, and
//!   field-level majority voting across OCR passes. Text and barcode
//!   recognition are injected as traits.
//! - [`vision::models::ModelManager`]: locating, downloading, and loading
//!   the ONNX model assets.
//!
//! Camera capture, screen flow, result transport, and the downstream
//! enrollment protocol are external collaborators consuming
//! [`vision::VerificationResult`] and [`ocr::DocumentFields`].

pub mod config;
pub mod error;
pub mod frame;
pub mod ocr;
pub mod vision;

pub use config::VerifyConfig;
pub use error::VerifyError;
pub use frame::Frame;
pub use ocr::{BarcodeReader, DocumentFields, DocumentReader, TextRecognizer};
pub use vision::{VerificationPipeline, VerificationResult};
