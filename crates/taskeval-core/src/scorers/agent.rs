use taskeval_types::{AgentOutput, MetricsMap};

use crate::scorer::{abs_diff, overlap, Scorer};
use crate::similarity::text_similarity;

/// Result similarity plus tool-set overlap. Action order is not scored.
pub struct AgentScorer;

impl Scorer<AgentOutput> for AgentScorer {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn score(&self, predicted: &AgentOutput, expected: &AgentOutput) -> MetricsMap {
        let predicted_actions = predicted.actions_taken.len();
        let expected_actions = expected.actions_taken.len();

        MetricsMap::new("task_completion_score", text_similarity(&predicted.result, &expected.result))
            .with("tool_usage_score", overlap(&predicted.tool_names(), &expected.tool_names()))
            .with("action_count_diff", predicted_actions.abs_diff(expected_actions))
            .with("confidence_diff", abs_diff(predicted.confidence, expected.confidence))
            .with("predicted_actions", predicted_actions)
            .with("expected_actions", expected_actions)
            .with("predicted_confidence", predicted.confidence)
            .with("expected_confidence", expected.confidence)
    }
}
