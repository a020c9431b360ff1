use std::collections::BTreeSet;

use taskeval_types::{MetricsMap, RagOutput};

use crate::scorer::{abs_diff, overlap, Scorer};
use crate::similarity::text_similarity;

/// Answer similarity, plus retrieval overlap by passage content.
pub struct RagScorer;

impl Scorer<RagOutput> for RagScorer {
    fn name(&self) -> &'static str {
        "rag"
    }

    fn score(&self, predicted: &RagOutput, expected: &RagOutput) -> MetricsMap {
        let contents = |out: &RagOutput| -> BTreeSet<String> {
            out.retrieved_documents.iter().map(|p| p.content.clone()).collect()
        };
        let predicted_count = predicted.retrieved_documents.len();
        let expected_count = expected.retrieved_documents.len();

        MetricsMap::new("answer_quality", text_similarity(&predicted.answer, &expected.answer))
            .with("retrieval_quality", overlap(&contents(predicted), &contents(expected)))
            .with("retrieved_count_diff", predicted_count.abs_diff(expected_count))
            .with("confidence_diff", abs_diff(predicted.confidence, expected.confidence))
            .with("predicted_retrieved_count", predicted_count)
            .with("expected_retrieved_count", expected_count)
            .with("predicted_confidence", predicted.confidence)
            .with("expected_confidence", expected.confidence)
    }
}
