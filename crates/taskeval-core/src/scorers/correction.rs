use taskeval_types::{CorrectionOutput, MetricsMap};

use crate::scorer::{abs_diff, Scorer};
use crate::similarity::text_similarity;

pub struct CorrectionScorer;

impl Scorer<CorrectionOutput> for CorrectionScorer {
    fn name(&self) -> &'static str {
        "correction"
    }

    fn score(&self, predicted: &CorrectionOutput, expected: &CorrectionOutput) -> MetricsMap {
        let similarity = text_similarity(&predicted.corrected_text, &expected.corrected_text);
        MetricsMap::new("similarity_score", similarity)
            .with(
                "correction_count_diff",
                predicted.corrections.len().abs_diff(expected.corrections.len()),
            )
            .with("confidence_diff", abs_diff(predicted.confidence, expected.confidence))
            .with("predicted_corrections", predicted.corrections.len())
            .with("expected_corrections", expected.corrections.len())
            .with("predicted_confidence", predicted.confidence)
            .with("expected_confidence", expected.confidence)
    }
}
