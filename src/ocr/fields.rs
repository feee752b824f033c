//! Field-extraction heuristics for recognized document text
//!
//! Takes the noisy line output of an external text recognizer and pulls out
//! structured identity-card fields. Keyword matching is data-driven so rules
//! can be localized or extended without touching the extraction logic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::DocumentFields;

/// Provenance tag for a single OCR extraction pass
pub const SOURCE_OCR_SINGLE: &str = "OCR_SINGLE";

/// A recognized text line with its bounding box `(x, y, width, height)`
#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub bounds: (u32, u32, u32, u32),
}

impl TextLine {
    pub fn new(text: impl Into<String>, bounds: (u32, u32, u32, u32)) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

/// Which field a keyword marker introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTarget {
    Origin,
    Address,
}

/// A keyword marker line, language-tagged for localization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Lowercase substring to look for in a normalized line
    pub keyword: String,
    /// Field the marker introduces
    pub field: FieldTarget,
    /// BCP-47-ish language tag, e.g. "vi"
    pub language: String,
}

impl KeywordRule {
    fn new(keyword: &str, field: FieldTarget, language: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            field,
            language: language.to_string(),
        }
    }
}

/// Rule tables driving the heuristic extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRules {
    /// Markers whose following line (or colon suffix) carries a field value
    #[serde(default = "default_keyword_rules")]
    pub keyword_rules: Vec<KeywordRule>,
    /// Uppercase boilerplate phrases that disqualify a line as a name
    #[serde(default = "default_name_blacklist")]
    pub name_blacklist: Vec<String>,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            keyword_rules: default_keyword_rules(),
            name_blacklist: default_name_blacklist(),
        }
    }
}

/// Vietnamese CCCD marker lines, with diacritic-stripped variants for OCR
/// passes that mangle accents.
pub fn default_keyword_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("quê quán", FieldTarget::Origin, "vi"),
        KeywordRule::new("que quan", FieldTarget::Origin, "vi"),
        KeywordRule::new("place of origin", FieldTarget::Origin, "en"),
        KeywordRule::new("nơi thường trú", FieldTarget::Address, "vi"),
        KeywordRule::new("noi thuong tru", FieldTarget::Address, "vi"),
        KeywordRule::new("place of residence", FieldTarget::Address, "en"),
    ]
}

/// Card boilerplate that must never be mistaken for a person's name.
pub fn default_name_blacklist() -> Vec<String> {
    [
        "CỘNG HÒA",
        "CHỦ NGHĨA",
        "VIỆT NAM",
        "CĂN CƯỚC",
        "CITIZEN IDENTITY",
        "HỌ VÀ TÊN",
        "FULL NAME",
        "NGÀY SINH",
        "DATE OF BIRTH",
        "QUÊ QUÁN",
        "NƠI THƯỜNG TRÚ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Normalize recognized text for parsing: Unicode NFC composition, invisible
/// and control characters collapsed to spaces, punctuation outside the
/// allow-list `{letters, digits, whitespace, , . / : -}` stripped, repeated
/// whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let composed: String = s.trim().nfc().collect();

    let mut cleaned = String::with_capacity(composed.len());
    for c in composed.chars() {
        if matches!(c, '\u{00A0}' | '\u{200B}' | '\u{FEFF}') || c.is_control() {
            cleaned.push(' ');
        } else if c.is_alphanumeric()
            || c.is_whitespace()
            || matches!(c, ',' | '.' | '/' | ':' | '-')
        {
            cleaned.push(c);
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-case a name or place using Unicode casing rules
pub fn title_case(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a date of birth to `dd/mm/yyyy` when one of three literal
/// layouts matches: `dd/mm/yyyy`, `ddmmyyyy`, or `yyyy/mm/dd` (reversed).
/// Unmatched input passes through (separators unified, whitespace stripped).
pub fn format_dob(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .replace(['.', '-'], "/")
        .split_whitespace()
        .collect();

    let full = Regex::new(r"\b(\d{2})/(\d{2})/(\d{4})\b").unwrap();
    let compact = Regex::new(r"\b(\d{2})(\d{2})(\d{4})\b").unwrap();
    let reversed = Regex::new(r"\b(\d{4})/(\d{2})/(\d{2})\b").unwrap();

    if let Some(c) = full.captures(&cleaned) {
        return format!("{}/{}/{}", &c[1], &c[2], &c[3]);
    }
    if let Some(c) = compact.captures(&cleaned) {
        return format!("{}/{}/{}", &c[1], &c[2], &c[3]);
    }
    if let Some(c) = reversed.captures(&cleaned) {
        return format!("{}/{}/{}", &c[3], &c[2], &c[1]);
    }
    cleaned
}

fn after_colon(line: &str) -> String {
    line.split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default()
}

/// Extract candidate document fields from one OCR pass.
pub fn parse_lines(lines: &[TextLine], rules: &FieldRules) -> DocumentFields {
    let texts: Vec<String> = lines.iter().map(|l| normalize_text(&l.text)).collect();

    let id_pattern = Regex::new(r"\b\d{9,12}\b").unwrap();
    let dob_pattern = Regex::new(r"\b\d{1,2}[/\-.\s]\d{1,2}[/\-.\s]\d{2,4}\b").unwrap();

    let id_number: String = texts
        .iter()
        .find(|t| id_pattern.is_match(t))
        .map(|t| t.chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default();

    let dob = texts
        .iter()
        .find_map(|t| dob_pattern.find(t).map(|m| m.as_str().to_string()))
        .unwrap_or_default();

    let hits_blacklist = |t: &str| {
        let upper = t.to_uppercase();
        rules.name_blacklist.iter().any(|kw| upper.contains(kw))
    };
    let letter_heavy = |t: &str| {
        let total = t.chars().count();
        total > 0 && t.chars().filter(|c| c.is_alphabetic()).count() * 2 >= total
    };

    // Name sits near the top of the card: search the top quarter of lines
    // first, then fall back to a whole-document scan.
    let top_count = (texts.len() / 4).max(3).min(texts.len());
    let full_name = texts
        .iter()
        .take(top_count)
        .find(|t| t.chars().count() > 3 && letter_heavy(t) && !hits_blacklist(t))
        .or_else(|| {
            texts
                .iter()
                .find(|t| t.chars().count() > 4 && !hits_blacklist(t))
        })
        .cloned()
        .unwrap_or_default();

    // Origin and address follow their keyword marker lines.
    let mut origin = String::new();
    let mut address = String::new();
    for (i, t) in texts.iter().enumerate() {
        let lower = t.to_lowercase();
        for rule in &rules.keyword_rules {
            if lower.contains(&rule.keyword) {
                let value = texts
                    .get(i + 1)
                    .cloned()
                    .unwrap_or_else(|| after_colon(t));
                match rule.field {
                    FieldTarget::Origin => origin = value,
                    FieldTarget::Address => address = value,
                }
            }
        }
    }

    // No marker found: fall back to the two longest lines on the card.
    if origin.is_empty() || address.is_empty() {
        let mut long_lines: Vec<&String> =
            texts.iter().filter(|t| t.chars().count() > 8).collect();
        long_lines.sort_by_key(|t| t.chars().count());
        if address.is_empty() {
            if let Some(longest) = long_lines.last() {
                address = (*longest).clone();
            }
        }
        if origin.is_empty() && long_lines.len() >= 2 {
            origin = long_lines[long_lines.len() - 2].clone();
        }
    }

    DocumentFields {
        id_number,
        full_name: title_case(&full_name),
        dob: format_dob(&dob),
        address: title_case(&address),
        origin: title_case(&origin),
        source: SOURCE_OCR_SINGLE.to_string(),
    }
}
