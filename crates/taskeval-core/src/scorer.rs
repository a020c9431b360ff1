use taskeval_types::{MetricsMap, TaskOutput};

use crate::error::ScoreError;
use crate::scorers::{
    agent::AgentScorer, classification::ClassificationScorer, correction::CorrectionScorer,
    dialogue::DialogueScorer, rag::RagScorer,
};

/// Compares a predicted output against the stored expectation.
///
/// Scorers are pure: no I/O, and identical inputs always produce identical
/// metrics.
pub trait Scorer<T>: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, predicted: &T, expected: &T) -> MetricsMap;
}

/// Score two outputs of the same task kind with that kind's scorer.
pub fn score(predicted: &TaskOutput, expected: &TaskOutput) -> Result<MetricsMap, ScoreError> {
    let metrics = match (predicted, expected) {
        (TaskOutput::Classification(p), TaskOutput::Classification(e)) => ClassificationScorer.score(p, e),
        (TaskOutput::Correction(p), TaskOutput::Correction(e)) => CorrectionScorer.score(p, e),
        (TaskOutput::Dialogue(p), TaskOutput::Dialogue(e)) => DialogueScorer.score(p, e),
        (TaskOutput::Rag(p), TaskOutput::Rag(e)) => RagScorer.score(p, e),
        (TaskOutput::Agent(p), TaskOutput::Agent(e)) => AgentScorer.score(p, e),
        _ => {
            return Err(ScoreError::KindMismatch {
                predicted: predicted.kind(),
                expected: expected.kind(),
            })
        }
    };
    Ok(metrics)
}

/// `|a - b|`, the shape of every `*_diff` metric.
pub(crate) fn abs_diff(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Share of `expected` found in `predicted`; 0 when nothing is expected.
pub(crate) fn overlap<T: Ord>(
    predicted: &std::collections::BTreeSet<T>,
    expected: &std::collections::BTreeSet<T>,
) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    predicted.intersection(expected).count() as f64 / expected.len() as f64
}
