use std::collections::BTreeMap;

use taskeval_types::{ClassificationInput, ClassificationOutput};

use super::{complete, Route, Seed};
use crate::error::ExecutionError;
use crate::extract::extract_label;
use crate::fallback::{seed_index, seed_range};
use crate::provider::{ChatMessage, CompletionRequest};

const SYSTEM_PROMPT: &str = "You are a professional text classification assistant.";
const SENTIMENT_LABELS: [&str; 3] = ["positive", "negative", "neutral"];

pub(crate) async fn run(
    route: &Route,
    model: &str,
    input: &ClassificationInput,
    seed: &Seed<'_>,
) -> Result<ClassificationOutput, ExecutionError> {
    let labels = input.labels.as_deref().filter(|l| !l.is_empty());
    let client = match route {
        Route::Provider(client) => client,
        Route::Fallback => return Ok(fallback(labels, seed)),
    };

    let request = CompletionRequest::new(SYSTEM_PROMPT, vec![ChatMessage::user(prompt(input))])
        .temperature(0.1);
    let raw = complete(client.as_ref(), model, &request).await?;

    let mut output = extract_label(&raw, labels);
    if labels.is_some() {
        output.probabilities = Some(BTreeMap::from([(
            output.predicted_label.clone(),
            output.confidence,
        )]));
    }
    Ok(output)
}

fn prompt(input: &ClassificationInput) -> String {
    match input.labels.as_deref() {
        Some(labels) if !labels.is_empty() => format!(
            "Classify the following text, choosing the most appropriate label from the given set.\n\n\
             Text: {}\n\n\
             Labels: {}\n\n\
             Respond in JSON with the fields predicted_label and confidence.",
            input.text,
            labels.join(", ")
        ),
        _ => format!(
            "Classify the sentiment of the following text.\n\n\
             Text: {}\n\n\
             Choose one of: positive, negative, neutral\n\n\
             Respond in JSON with the fields predicted_label and confidence.",
            input.text
        ),
    }
}

fn fallback(labels: Option<&[String]>, seed: &Seed<'_>) -> ClassificationOutput {
    let candidates: Vec<String> = match labels {
        Some(labels) => labels.to_vec(),
        None => SENTIMENT_LABELS.iter().map(|s| s.to_string()).collect(),
    };
    let predicted = candidates[seed_index(&seed.parts("label"), candidates.len())].clone();
    let confidence = seed_range(&seed.parts("confidence"), 0.6, 0.95);

    let probabilities = labels.map(|labels| {
        let others = labels.len().saturating_sub(1).max(1) as f64;
        labels
            .iter()
            .map(|label| {
                let p = if *label == predicted {
                    confidence
                } else {
                    (1.0 - confidence) / others
                };
                (label.clone(), p)
            })
            .collect()
    });

    ClassificationOutput {
        predicted_label: predicted,
        confidence,
        probabilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::scripted::ScriptedProvider;
    use std::sync::Arc;
    use taskeval_types::TaskInput;

    fn input(labels: Option<&[&str]>) -> ClassificationInput {
        ClassificationInput {
            text: "这个产品真的很棒".into(),
            labels: labels.map(|l| l.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn seed_for(model: &'static str, input: &ClassificationInput) -> Seed<'static> {
        Seed::new(model, &TaskInput::Classification(input.clone()))
    }

    #[tokio::test]
    async fn test_provider_json_with_labels() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"predicted_label": "positive", "confidence": 0.93}"#,
        ]));
        let input = input(Some(&["positive", "negative", "neutral"]));
        let route = Route::Provider(provider.clone());
        let out = run(&route, "gpt-4", &input, &seed_for("gpt-4", &input))
            .await
            .unwrap();

        assert_eq!(out.predicted_label, "positive");
        assert_eq!(out.probabilities.unwrap()["positive"], 0.93);

        let requests = provider.requests();
        assert_eq!(requests[0].temperature, Some(0.1));
        assert!(requests[0].messages[0].content.contains("Labels: positive, negative, neutral"));
    }

    #[tokio::test]
    async fn test_provider_free_text_without_labels() {
        let provider = Arc::new(ScriptedProvider::new(["The sentiment is negative."]));
        let input = input(None);
        let route = Route::Provider(provider);
        let out = run(&route, "gpt-4", &input, &seed_for("gpt-4", &input))
            .await
            .unwrap();
        assert_eq!(out.predicted_label, "negative");
        assert_eq!(out.confidence, 0.5);
        assert!(out.probabilities.is_none());
    }

    #[test]
    fn test_fallback_probabilities_sum_to_one() {
        let input = input(Some(&["positive", "negative", "neutral"]));
        let out = fallback(input.labels.as_deref(), &seed_for("mock", &input));
        assert!((0.6..0.95).contains(&out.confidence));
        let probabilities = out.probabilities.unwrap();
        assert_eq!(probabilities.len(), 3);
        assert!((probabilities.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(probabilities[&out.predicted_label], out.confidence);
    }

    #[test]
    fn test_fallback_without_labels_uses_sentiment() {
        let input = input(None);
        let out = fallback(None, &seed_for("mock", &input));
        assert!(SENTIMENT_LABELS.contains(&out.predicted_label.as_str()));
        assert!(out.probabilities.is_none());
    }
}
