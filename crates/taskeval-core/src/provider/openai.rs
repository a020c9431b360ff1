use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{truncate_body, ChatMessage, CompletionRequest, ProviderClient, Role};
use crate::error::ProviderError;
use crate::trace::{report_trace, TokenUsage, Trace};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI-compatible `/v1/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn request_body(model: &str, request: &CompletionRequest) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(request.messages.iter().map(message_json));

        let mut body = json!({ "model": model, "messages": messages });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<(String, Option<TokenUsage>), ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("no choices[0].message.content".into()))?;
        let usage = parsed.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        Ok((content, usage))
    }
}

fn message_json(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    json!({"role": role, "content": message.content})
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let body = Self::request_body(model, request);
        let trace = Trace::start_now().provider("openai").model(model);
        tracing::debug!(provider = "openai", model, messages = request.messages.len(), "chat completion");

        match self.send(&body).await {
            Ok((content, usage)) => {
                report_trace(trace.finish(body, json!(content), usage));
                Ok(content)
            }
            Err(err) => {
                report_trace(trace.finish_with_error(body, err.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::scope_traces;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_completion_and_trace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.1,
                "messages": [
                    {"role": "system", "content": "classify"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"predicted_label\": \"positive\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test").with_base_url(server.uri());
        let request = CompletionRequest::new("classify", vec![ChatMessage::user("hello")])
            .temperature(0.1);

        let (result, traces) = scope_traces(client.complete("gpt-4o-mini", &request)).await;
        assert_eq!(result.unwrap(), "{\"predicted_label\": \"positive\"}");
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].provider.as_deref(), Some("openai"));
        assert_eq!(traces[0].usage.map(|u| u.total_tokens), Some(19));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("bad").with_base_url(server.uri());
        let request = CompletionRequest::new("s", vec![ChatMessage::user("u")]);
        let (result, traces) = scope_traces(client.complete("gpt-4", &request)).await;
        match result {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(traces[0].error.is_some());
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("k").with_base_url(server.uri());
        let request = CompletionRequest::new("s", vec![ChatMessage::user("u")]);
        let err = client.complete("gpt-4", &request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
