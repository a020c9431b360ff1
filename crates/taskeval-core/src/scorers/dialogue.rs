use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use taskeval_types::{DialogueOutput, DialogueTurn, MetricsMap};

use crate::scorer::{abs_diff, Scorer};
use crate::similarity::{text_similarity, word_set};

pub struct DialogueScorer;

impl Scorer<DialogueOutput> for DialogueScorer {
    fn name(&self) -> &'static str {
        "dialogue"
    }

    fn score(&self, predicted: &DialogueOutput, expected: &DialogueOutput) -> MetricsMap {
        let predicted_length = predicted.response.chars().count();
        let expected_length = expected.response.chars().count();
        let length_ratio = match predicted_length.max(expected_length) {
            0 => 1.0,
            longest => predicted_length.min(expected_length) as f64 / longest as f64,
        };

        MetricsMap::new("relevance_score", text_similarity(&predicted.response, &expected.response))
            .with("length_diff", predicted_length.abs_diff(expected_length))
            .with("length_ratio", length_ratio)
            .with("confidence_diff", abs_diff(predicted.confidence, expected.confidence))
            .with("context_consistency", predicted.context_used == expected.context_used)
            .with("predicted_length", predicted_length)
            .with("expected_length", expected_length)
            .with("predicted_confidence", predicted.confidence)
            .with("expected_confidence", expected.confidence)
    }
}

/// Reference-free quality signals for a single reply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogueQuality {
    pub length_score: f64,
    pub keyword_match: f64,
    pub context_relevance: f64,
}

pub fn dialogue_quality(response: &str, message: &str, context: Option<&[DialogueTurn]>) -> DialogueQuality {
    let length = response.chars().count();
    let length_score = match length {
        0..=9 => length as f64 / 10.0,
        10..=500 => 1.0,
        _ => (500.0 / length as f64).max(0.5),
    };

    let reply_words = word_set(response);
    let context_words: HashSet<String> = context
        .unwrap_or_default()
        .iter()
        .flat_map(|turn| word_set(&turn.content))
        .collect();

    DialogueQuality {
        length_score,
        keyword_match: coverage(&word_set(message), &reply_words),
        context_relevance: coverage(&context_words, &reply_words),
    }
}

/// Share of `words` that appear in `reply`; 0 for an empty word set.
fn coverage(words: &HashSet<String>, reply: &HashSet<String>) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    words.intersection(reply).count() as f64 / words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(response: &str, context_used: Option<bool>) -> DialogueOutput {
        DialogueOutput {
            response: response.into(),
            confidence: 0.8,
            context_used,
        }
    }

    #[test]
    fn test_length_metrics() {
        let metrics = DialogueScorer.score(&reply("Paris", Some(true)), &reply("Paris, France", Some(true)));
        assert_eq!(metrics.number("length_diff"), Some(8.0));
        assert!((metrics.number("length_ratio").unwrap() - 5.0 / 13.0).abs() < 1e-9);
        assert_eq!(metrics.number("context_consistency"), Some(1.0));
        assert!(metrics.primary_score() < 1.0);
    }

    #[test]
    fn test_empty_responses() {
        let metrics = DialogueScorer.score(&reply("", None), &reply("", Some(false)));
        assert_eq!(metrics.primary_score(), 1.0);
        assert_eq!(metrics.number("length_ratio"), Some(1.0));
        assert_eq!(metrics.number("context_consistency"), Some(0.0));
    }

    #[test]
    fn test_dialogue_quality() {
        let context = [DialogueTurn::new("user", "I live in Lyon")];
        let quality = dialogue_quality(
            "The capital of France is Paris, not Lyon",
            "what is the capital of France",
            Some(&context),
        );
        assert_eq!(quality.length_score, 1.0);
        // {what, is, the, capital, of, france}: all but "what"
        assert!((quality.keyword_match - 5.0 / 6.0).abs() < 1e-9);
        // {i, live, in, lyon}: only "lyon"
        assert!((quality.context_relevance - 0.25).abs() < 1e-9);

        assert_eq!(dialogue_quality("Hi!", "hello", None).length_score, 0.3);
        assert_eq!(dialogue_quality(&"a".repeat(1000), "x", None).length_score, 0.5);
        assert_eq!(dialogue_quality("short one", "x", None).context_relevance, 0.0);
    }
}
