use std::sync::OnceLock;

use regex::Regex;
use taskeval_types::{CorrectionEdit, CorrectionInput, CorrectionOutput};

use super::{complete, Route, Seed};
use crate::error::ExecutionError;
use crate::extract::extract_correction;
use crate::fallback::seed_range;
use crate::provider::{ChatMessage, CompletionRequest};

const SYSTEM_PROMPT: &str = "You are a professional text correction assistant.";

const COMMON_MISSPELLINGS: [(&str, &str); 4] = [
    ("teh", "the"),
    ("recieve", "receive"),
    ("seperate", "separate"),
    ("occured", "occurred"),
];

pub(crate) async fn run(
    route: &Route,
    model: &str,
    input: &CorrectionInput,
    seed: &Seed<'_>,
) -> Result<CorrectionOutput, ExecutionError> {
    let client = match route {
        Route::Provider(client) => client,
        Route::Fallback => return Ok(fallback(&input.text, seed)),
    };

    let request = CompletionRequest::new(SYSTEM_PROMPT, vec![ChatMessage::user(prompt(input))])
        .temperature(0.1);
    let raw = complete(client.as_ref(), model, &request).await?;
    Ok(extract_correction(&raw, &input.text))
}

fn instruction(correction_type: &str) -> &'static str {
    match correction_type {
        "spelling" => "Correct the spelling errors in the following text:",
        "style" => "Improve the style of the following text so that it reads fluently and naturally:",
        _ => "Correct the grammatical errors in the following text without changing its meaning:",
    }
}

fn prompt(input: &CorrectionInput) -> String {
    format!(
        "{}\n\n\
         Original: {}\n\n\
         Respond in JSON with the fields:\n\
         - corrected_text: the corrected text\n\
         - corrections: list of edits, each with original, corrected, type and position\n\
         - confidence: confidence of the correction (0-1)",
        instruction(&input.correction_type),
        input.text
    )
}

fn misspelling_patterns() -> &'static [(Regex, &'static str, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        COMMON_MISSPELLINGS
            .iter()
            .map(|&(wrong, right)| {
                let re = Regex::new(&format!(r"(?i)\b{wrong}\b")).expect("misspelling pattern is valid");
                (re, wrong, right)
            })
            .collect()
    })
}

/// Fixes a handful of common misspellings; one edit per misspelled word.
fn fallback(text: &str, seed: &Seed<'_>) -> CorrectionOutput {
    let mut corrected_text = text.to_string();
    let mut corrections = Vec::new();

    for (re, wrong, right) in misspelling_patterns() {
        let Some(first) = re.find(text) else {
            continue;
        };
        corrections.push(CorrectionEdit {
            original: (*wrong).to_string(),
            corrected: (*right).to_string(),
            kind: "spelling".to_string(),
            position: Some(text[..first.start()].chars().count() as i64),
        });
        corrected_text = re.replace_all(&corrected_text, *right).into_owned();
    }

    CorrectionOutput {
        corrected_text,
        corrections,
        confidence: seed_range(&seed.parts("confidence"), 0.7, 0.95),
    }
}
