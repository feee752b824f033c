//! Positional QR payload parsing
//!
//! Identity-card QR payloads are delimiter-separated with issuer-dependent
//! field positions. Parsing is positional with documented fallbacks; a
//! malformed payload yields a typed parse error that the caller tags as
//! `QR_ERROR`.

use crate::error::VerifyError;

use super::fields::format_dob;
use super::DocumentFields;

/// Provenance tag for a successfully parsed QR payload
pub const SOURCE_QR: &str = "QR";
/// Provenance tag for a malformed QR payload
pub const SOURCE_QR_ERROR: &str = "QR_ERROR";

/// Parse a raw QR payload into document fields.
///
/// Splits on `|`, else `;`, else whitespace. Field positions: id at 0
/// (stripped to digits), name at 2 falling back to 1, date of birth at 3
/// (reformatted from `ddMMyyyy` when exactly 8 digits), address at 5 falling
/// back to 4.
pub fn parse_qr_payload(raw: &str) -> Result<DocumentFields, VerifyError> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(VerifyError::Parse("blank QR payload".to_string()));
    }

    let parts: Vec<&str> = if cleaned.contains('|') {
        cleaned.split('|').collect()
    } else if cleaned.contains(';') {
        cleaned.split(';').collect()
    } else {
        cleaned.split_whitespace().collect()
    };

    let id_number: String = parts
        .first()
        .map(|p| p.chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default();
    if id_number.is_empty() {
        return Err(VerifyError::Parse(
            "QR payload carries no document number".to_string(),
        ));
    }

    let full_name = parts
        .get(2)
        .or_else(|| parts.get(1))
        .map(|p| p.trim().to_string())
        .unwrap_or_default();

    let dob_raw = parts.get(3).map(|p| p.trim()).unwrap_or_default();
    let dob = if dob_raw.len() == 8 && dob_raw.chars().all(|c| c.is_ascii_digit()) {
        format_dob(dob_raw)
    } else {
        dob_raw.to_string()
    };

    let address = parts
        .get(5)
        .or_else(|| parts.get(4))
        .map(|p| p.trim().to_string())
        .unwrap_or_default();

    Ok(DocumentFields {
        id_number,
        full_name,
        dob,
        address,
        origin: String::new(),
        source: SOURCE_QR.to_string(),
    })
}

/// The tagged-empty field set returned when a QR payload fails to parse.
/// It short-circuits OCR for the document all the same.
pub fn qr_error_fields() -> DocumentFields {
    DocumentFields {
        source: SOURCE_QR_ERROR.to_string(),
        ..DocumentFields::default()
    }
}
