use taskeval_types::{DialogueInput, DialogueOutput};

use super::{complete, prefix_chars, Route, Seed};
use crate::error::ExecutionError;
use crate::extract::extract_text;
use crate::fallback::{seed_index, seed_range};
use crate::provider::{ChatMessage, CompletionRequest, Role};

const SYSTEM_PROMPT: &str = "You are a helpful, friendly and honest AI assistant. \
                             Answer the user's questions accurately and helpfully.";

/// Prior turns forwarded to the provider.
const CONTEXT_WINDOW: usize = 5;

pub(crate) async fn run(
    route: &Route,
    model: &str,
    input: &DialogueInput,
    seed: &Seed<'_>,
) -> Result<DialogueOutput, ExecutionError> {
    let client = match route {
        Route::Provider(client) => client,
        Route::Fallback => return Ok(fallback(input, seed)),
    };

    let request = CompletionRequest::new(SYSTEM_PROMPT, messages(input))
        .temperature(0.7)
        .max_tokens(1000);
    let raw = complete(client.as_ref(), model, &request).await?;
    let response = extract_text(&raw, "response");
    let confidence = (response.chars().count() as f64 / 100.0 + 0.5).min(0.9);

    Ok(DialogueOutput {
        response,
        confidence,
        context_used: Some(input.has_context()),
    })
}

/// The last few context turns that carry both a role and content, then the
/// new user message.
fn messages(input: &DialogueInput) -> Vec<ChatMessage> {
    let context = input.context.as_deref().unwrap_or_default();
    let recent = &context[context.len().saturating_sub(CONTEXT_WINDOW)..];

    let mut messages: Vec<ChatMessage> = recent
        .iter()
        .filter(|turn| !turn.role.trim().is_empty() && !turn.content.is_empty())
        .map(|turn| ChatMessage::new(Role::parse_lenient(&turn.role), turn.content.clone()))
        .collect();
    messages.push(ChatMessage::user(input.message.clone()));
    messages
}

fn fallback(input: &DialogueInput, seed: &Seed<'_>) -> DialogueOutput {
    let snippet = prefix_chars(&input.message, 20);
    let templates = [
        format!("I understand your question about '{snippet}...'. Let me explain in detail."),
        format!("Regarding '{snippet}...', I think that's a great question."),
        format!("Thanks for asking. On the topic of '{snippet}...', here is my view:"),
        format!("That's an interesting question. About '{snippet}...', I suggest considering the following points:"),
    ];
    let response = templates[seed_index(&seed.parts("template"), templates.len())].clone();

    DialogueOutput {
        response,
        confidence: seed_range(&seed.parts("confidence"), 0.7, 0.95),
        context_used: Some(input.has_context()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::scripted::ScriptedProvider;
    use std::sync::Arc;
    use taskeval_types::{DialogueTurn, TaskInput};

    fn input(context: Option<Vec<DialogueTurn>>) -> DialogueInput {
        DialogueInput {
            message: "What is the capital of France?".into(),
            context,
            user_id: None,
        }
    }

    #[test]
    fn test_context_window_and_filtering() {
        let mut turns: Vec<DialogueTurn> = (0..7)
            .map(|i| DialogueTurn::new(if i % 2 == 0 { "user" } else { "assistant" }, format!("turn {i}")))
            .collect();
        turns[4].content.clear();
        let messages = messages(&input(Some(turns)));
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            ["turn 2", "turn 3", "turn 5", "turn 6", "What is the capital of France?"]
        );
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_provider_confidence_and_context_flag() {
        let provider = Arc::new(ScriptedProvider::new(["Paris."]));
        let input = input(Some(vec![DialogueTurn::new("user", "hi")]));
        let seed = Seed::new("gpt-4", &TaskInput::Dialogue(input.clone()));
        let route = Route::Provider(provider.clone());
        let out = run(&route, "gpt-4", &input, &seed).await.unwrap();

        assert_eq!(out.response, "Paris.");
        assert!((out.confidence - 0.56).abs() < 1e-9);
        assert_eq!(out.context_used, Some(true));

        let request = &provider.requests()[0];
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_long_response_confidence_is_capped() {
        let provider = Arc::new(ScriptedProvider::new(["x".repeat(300)]));
        let input = input(None);
        let seed = Seed::new("gpt-4", &TaskInput::Dialogue(input.clone()));
        let out = run(&Route::Provider(provider), "gpt-4", &input, &seed)
            .await
            .unwrap();
        assert_eq!(out.confidence, 0.9);
        assert_eq!(out.context_used, Some(false));
    }

    #[test]
    fn test_fallback_quotes_message_prefix() {
        let input = input(Some(Vec::new()));
        let seed = Seed::new("mock", &TaskInput::Dialogue(input.clone()));
        let out = fallback(&input, &seed);
        assert!(out.response.contains("'What is the capital ...'"));
        assert_eq!(out.context_used, Some(false));
        assert!((0.7..0.95).contains(&out.confidence));
    }
}
