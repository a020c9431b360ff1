use std::collections::BTreeSet;

use taskeval_types::{ClassificationOutput, MetricsMap};

use crate::error::ScoreError;
use crate::scorer::{abs_diff, Scorer};

/// Exact label match.
pub struct ClassificationScorer;

impl Scorer<ClassificationOutput> for ClassificationScorer {
    fn name(&self) -> &'static str {
        "classification"
    }

    fn score(&self, predicted: &ClassificationOutput, expected: &ClassificationOutput) -> MetricsMap {
        let accuracy = if predicted.predicted_label == expected.predicted_label {
            1.0
        } else {
            0.0
        };
        MetricsMap::new("accuracy", accuracy)
            .with("predicted_label", predicted.predicted_label.clone())
            .with("expected_label", expected.predicted_label.clone())
            .with("confidence_diff", abs_diff(predicted.confidence, expected.confidence))
            .with("predicted_confidence", predicted.confidence)
            .with("expected_confidence", expected.confidence)
    }
}

/// Aggregate metrics over a batch of classifications.
///
/// Precision, recall and F1 are computed per label over the union of
/// predicted and expected labels, then averaged weighted by each label's
/// support in `expected`. A label that is never predicted has precision 0.
pub fn batch_evaluate(
    predictions: &[ClassificationOutput],
    expected: &[ClassificationOutput],
) -> Result<MetricsMap, ScoreError> {
    if predictions.len() != expected.len() {
        return Err(ScoreError::LengthMismatch {
            predicted: predictions.len(),
            expected: expected.len(),
        });
    }
    let n = predictions.len();
    if n == 0 {
        return Ok(MetricsMap::new("accuracy", 0.0)
            .with("precision", 0.0)
            .with("recall", 0.0)
            .with("f1_score", 0.0)
            .with("avg_confidence_diff", 0.0)
            .with("sample_count", 0usize));
    }

    let pairs: Vec<(&str, &str)> = predictions
        .iter()
        .zip(expected)
        .map(|(p, e)| (p.predicted_label.as_str(), e.predicted_label.as_str()))
        .collect();
    let correct = pairs.iter().filter(|(p, e)| p == e).count();

    let labels: BTreeSet<&str> = pairs.iter().flat_map(|&(p, e)| [p, e]).collect();
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for label in labels {
        let support = pairs.iter().filter(|(_, e)| *e == label).count();
        if support == 0 {
            continue;
        }
        let predicted = pairs.iter().filter(|(p, _)| *p == label).count();
        let hits = pairs.iter().filter(|(p, e)| *p == label && *e == label).count();

        let p = if predicted == 0 { 0.0 } else { hits as f64 / predicted as f64 };
        let r = hits as f64 / support as f64;
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };

        let weight = support as f64 / n as f64;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    let avg_confidence_diff = predictions
        .iter()
        .zip(expected)
        .map(|(p, e)| abs_diff(p.confidence, e.confidence))
        .sum::<f64>()
        / n as f64;

    Ok(MetricsMap::new("accuracy", correct as f64 / n as f64)
        .with("precision", precision)
        .with("recall", recall)
        .with("f1_score", f1)
        .with("avg_confidence_diff", avg_confidence_diff)
        .with("sample_count", n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(label: &str, confidence: f64) -> ClassificationOutput {
        ClassificationOutput {
            predicted_label: label.into(),
            confidence,
            probabilities: None,
        }
    }

    #[test]
    fn test_accuracy_ignores_confidence() {
        let expected = output("positive", 0.9);
        let hit = ClassificationScorer.score(&output("positive", 0.2), &expected);
        assert_eq!(hit.primary_score(), 1.0);
        assert!((hit.number("confidence_diff").unwrap() - 0.7).abs() < 1e-9);

        let miss = ClassificationScorer.score(&output("negative", 0.9), &expected);
        assert_eq!(miss.primary_score(), 0.0);
        assert_eq!(miss.number("confidence_diff"), Some(0.0));
        assert_eq!(miss.get("predicted_label").unwrap().to_string(), "negative");
    }

    #[test]
    fn test_batch_weighted_scores() {
        // expected: a a b ; predicted: a b b
        let predicted = [output("a", 0.8), output("b", 0.8), output("b", 0.8)];
        let expected = [output("a", 0.8), output("a", 0.8), output("b", 0.6)];
        let metrics = batch_evaluate(&predicted, &expected).unwrap();

        assert!((metrics.primary_score() - 2.0 / 3.0).abs() < 1e-9);
        // a: p=1 r=0.5 f=2/3 (w=2/3); b: p=0.5 r=1 f=2/3 (w=1/3)
        assert!((metrics.number("precision").unwrap() - 5.0 / 6.0).abs() < 1e-9);
        assert!((metrics.number("recall").unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.number("f1_score").unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.number("avg_confidence_diff").unwrap() - 0.2 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.number("sample_count"), Some(3.0));
    }

    #[test]
    fn test_batch_never_predicted_label() {
        let predicted = [output("a", 0.5), output("a", 0.5)];
        let expected = [output("a", 0.5), output("b", 0.5)];
        let metrics = batch_evaluate(&predicted, &expected).unwrap();
        // a: p=0.5 r=1 (w=0.5); b: p=0 r=0 (w=0.5)
        assert!((metrics.number("precision").unwrap() - 0.25).abs() < 1e-9);
        assert!((metrics.number("recall").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let err = batch_evaluate(&[output("a", 0.5)], &[]).unwrap_err();
        assert!(matches!(err, ScoreError::LengthMismatch { predicted: 1, expected: 0 }));
    }
}
