//! Structured-output extraction.
//!
//! Provider text is first parsed strictly (a JSON object, optionally inside a
//! single Markdown code fence, whose field types match the shape's schema).
//! When that fails the text is scanned heuristically instead. Extraction
//! never fails: malformed output degrades to defaults.

use std::sync::OnceLock;

use jsonschema::JSONSchema;
use regex::Regex;
use serde_json::{json, Map, Value};
use taskeval_types::{ClassificationOutput, CorrectionEdit, CorrectionOutput};

pub const DEFAULT_LABEL: &str = "unknown";
pub const LABEL_CONFIDENCE: f64 = 0.5;
pub const CORRECTION_CONFIDENCE: f64 = 0.8;
pub const HEURISTIC_CORRECTION_CONFIDENCE: f64 = 0.7;

const SENTIMENT_LABELS: [&str; 3] = ["positive", "negative", "neutral"];

/// What the caller expects the provider text to contain.
#[derive(Debug, Clone, Copy)]
pub enum OutputShape<'a> {
    /// A label, optionally from a closed set.
    Label { labels: Option<&'a [String]> },
    /// A corrected version of `original`.
    Correction { original: &'a str },
    /// Free text, optionally wrapped as `{"<field>": "..."}`.
    Text { field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Label(ClassificationOutput),
    Correction(CorrectionOutput),
    Text(String),
}

pub fn extract(raw: &str, shape: &OutputShape<'_>) -> Extracted {
    match *shape {
        OutputShape::Label { labels } => Extracted::Label(extract_label(raw, labels)),
        OutputShape::Correction { original } => {
            Extracted::Correction(extract_correction(raw, original))
        }
        OutputShape::Text { field } => Extracted::Text(extract_text(raw, field)),
    }
}

/// Label extraction. `probabilities` is left unset.
pub fn extract_label(raw: &str, labels: Option<&[String]>) -> ClassificationOutput {
    let schema = json!({
        "type": "object",
        "properties": {
            "predicted_label": {"type": "string"},
            "confidence": {"type": ["number", "string"]}
        }
    });

    if let Some(obj) = strict_object(raw, &schema) {
        return ClassificationOutput {
            predicted_label: obj
                .get("predicted_label")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_LABEL)
                .to_string(),
            confidence: confidence_field(&obj).unwrap_or(LABEL_CONFIDENCE),
            probabilities: None,
        };
    }

    tracing::debug!(shape = "label", "strict parse failed, scanning text for a label");
    ClassificationOutput {
        predicted_label: label_from_text(raw, labels),
        confidence: LABEL_CONFIDENCE,
        probabilities: None,
    }
}

/// First label of the closed set found in `text` (case-insensitive
/// substring), else the set's first label. This tie-break favours whichever
/// label a suite lists first. Without a set, sentiment markers decide.
pub fn label_from_text(text: &str, labels: Option<&[String]>) -> String {
    let lower = text.to_lowercase();
    match labels {
        Some(labels) if !labels.is_empty() => labels
            .iter()
            .find(|label| lower.contains(&label.to_lowercase()))
            .unwrap_or(&labels[0])
            .clone(),
        _ => {
            let label = if lower.contains("positive") || lower.contains("积极") {
                SENTIMENT_LABELS[0]
            } else if lower.contains("negative") || lower.contains("消极") {
                SENTIMENT_LABELS[1]
            } else {
                SENTIMENT_LABELS[2]
            };
            label.to_string()
        }
    }
}

pub fn extract_correction(raw: &str, original: &str) -> CorrectionOutput {
    let schema = json!({
        "type": "object",
        "properties": {
            "corrected_text": {"type": "string"},
            "corrections": {"type": "array", "items": {"type": "object"}},
            "confidence": {"type": ["number", "string"]}
        }
    });

    if let Some(obj) = strict_object(raw, &schema) {
        let corrections = obj
            .get("corrections")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<CorrectionEdit>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        return CorrectionOutput {
            corrected_text: obj
                .get("corrected_text")
                .and_then(Value::as_str)
                .unwrap_or(original)
                .to_string(),
            corrections,
            confidence: confidence_field(&obj).unwrap_or(CORRECTION_CONFIDENCE),
        };
    }

    tracing::debug!(shape = "correction", "strict parse failed, scanning text for a corrected line");
    let corrected_text = corrected_line(raw).unwrap_or_else(|| original.to_string());
    let corrections = word_diff(original, &corrected_text);
    CorrectionOutput {
        corrected_text,
        corrections,
        confidence: HEURISTIC_CORRECTION_CONFIDENCE,
    }
}

/// The text of a `{"<field>": "..."}` document, or `raw` unchanged.
pub fn extract_text(raw: &str, field: &'static str) -> String {
    let schema = json!({
        "type": "object",
        "required": [field],
        "properties": { field: {"type": "string"} }
    });
    strict_object(raw, &schema)
        .and_then(|obj| obj.get(field).and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

/// Text after the delimiter of the first line marked as the corrected text.
fn corrected_line(raw: &str) -> Option<String> {
    raw.lines()
        .filter(|line| line.contains("纠错后") || line.to_lowercase().contains("corrected"))
        .find_map(|line| {
            let idx = line.find(|c: char| c == ':' || c == '：')?;
            let delim_len = line[idx..].chars().next().map(char::len_utf8).unwrap_or(1);
            Some(line[idx + delim_len..].trim().to_string())
        })
}

/// Word-level edit list between two texts: deletions carry the character
/// offset of the word in `original`, additions carry no position.
pub fn word_diff(original: &str, corrected: &str) -> Vec<CorrectionEdit> {
    let a: Vec<&str> = original.split_whitespace().collect();
    let b: Vec<&str> = corrected.split_whitespace().collect();
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            i += 1;
            j += 1;
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            edits.push(CorrectionEdit {
                original: a[i].to_string(),
                corrected: String::new(),
                kind: "deletion".to_string(),
                position: char_offset(original, a[i]),
            });
            i += 1;
        } else {
            edits.push(CorrectionEdit {
                original: String::new(),
                corrected: b[j].to_string(),
                kind: "addition".to_string(),
                position: None,
            });
            j += 1;
        }
    }
    edits
}

fn char_offset(haystack: &str, needle: &str) -> Option<i64> {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() as i64)
}

fn strict_object(raw: &str, schema: &Value) -> Option<Map<String, Value>> {
    let body = unfence(raw.trim());
    let value: Value = serde_json::from_str(body).ok()?;
    if !conforms(schema, &value) {
        return None;
    }
    match value {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

fn conforms(schema: &Value, value: &Value) -> bool {
    match JSONSchema::compile(schema) {
        Ok(compiled) => compiled.is_valid(value),
        Err(err) => {
            tracing::warn!(error = %err, "invalid output schema");
            false
        }
    }
}

fn unfence(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_+-]*\s*(.*?)\s*```$").expect("fence pattern is valid")
    });
    fence
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// A `confidence` number or numeric string, clamped to [0, 1].
fn confidence_field(obj: &Map<String, Value>) -> Option<f64> {
    let value = match obj.get("confidence")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}
