//! Majority-vote aggregation of OCR candidates
//!
//! A pure fold over the ordered candidate sequence: per field, blanks are
//! discarded, the most frequent value wins, and ties break toward the value
//! encountered first. A sanity gate then annotates (never discards)
//! implausible results.

use std::collections::HashMap;

use super::DocumentFields;

/// Provenance tag when no candidate survived extraction
pub const SOURCE_EMPTY: &str = "EMPTY";
/// Suffix appended when the sanity gate fails
pub const LOW_CONFIDENCE_SUFFIX: &str = "/LOW_CONF";

/// Inclusive bounds on a plausible document number length
const ID_LENGTH_RANGE: (usize, usize) = (9, 12);
/// Minimum plausible full-name length
const NAME_MIN_LENGTH: usize = 4;

/// Pick the most frequent non-blank value; ties break toward the value seen
/// first in candidate order.
fn majority<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let filtered: Vec<&str> = values.filter(|v| !v.trim().is_empty()).collect();
    if filtered.is_empty() {
        return String::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &value in &filtered {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut winner = filtered[0];
    let mut winner_count = 0usize;
    for &value in &filtered {
        let count = counts[value];
        if count > winner_count {
            winner = value;
            winner_count = count;
        }
    }

    winner.to_string()
}

/// Merge OCR candidates into one field set by per-field majority vote
pub fn majority_vote(candidates: &[DocumentFields]) -> DocumentFields {
    if candidates.is_empty() {
        return DocumentFields {
            source: SOURCE_EMPTY.to_string(),
            ..DocumentFields::default()
        };
    }

    let mut sources: Vec<&str> = Vec::new();
    for candidate in candidates {
        if !sources.contains(&candidate.source.as_str()) {
            sources.push(&candidate.source);
        }
    }

    DocumentFields {
        id_number: majority(candidates.iter().map(|c| c.id_number.as_str())),
        full_name: majority(candidates.iter().map(|c| c.full_name.as_str())),
        dob: majority(candidates.iter().map(|c| c.dob.as_str())),
        address: majority(candidates.iter().map(|c| c.address.as_str())),
        origin: majority(candidates.iter().map(|c| c.origin.as_str())),
        source: format!("VOTED({})", sources.join(",")),
    }
}

/// Check the voted result for plausibility. A failing result is kept but its
/// source is annotated as low confidence.
pub fn apply_sanity_gate(fields: DocumentFields) -> DocumentFields {
    let id_len = fields.id_number.chars().count();
    let name_len = fields.full_name.chars().count();

    let plausible =
        id_len >= ID_LENGTH_RANGE.0 && id_len <= ID_LENGTH_RANGE.1 && name_len >= NAME_MIN_LENGTH;
    if plausible {
        fields
    } else {
        DocumentFields {
            source: format!("{}{}", fields.source, LOW_CONFIDENCE_SUFFIX),
            ..fields
        }
    }
}

/// Full aggregation: majority vote followed by the sanity gate
pub fn aggregate(candidates: &[DocumentFields]) -> DocumentFields {
    apply_sanity_gate(majority_vote(candidates))
}
