use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{truncate_body, CompletionRequest, ProviderClient, Role};
use crate::error::ProviderError;
use crate::trace::{report_trace, TokenUsage, Trace};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Anthropic `/v1/messages` client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
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

    /// System-role messages are folded into the top-level `system` field,
    /// which is the only place the messages API accepts them.
    fn request_body(model: &str, request: &CompletionRequest) -> Value {
        let mut system: Vec<&str> = request.system.iter().map(String::as_str).collect();
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            match message.role {
                Role::System => system.push(&message.content),
                Role::User => messages.push(json!({"role": "user", "content": message.content})),
                Role::Assistant => {
                    messages.push(json!({"role": "assistant", "content": message.content}))
                }
            }
        }

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<(String, Option<TokenUsage>), ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let texts: Vec<String> = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if texts.is_empty() {
            return Err(ProviderError::Malformed("no text content blocks".into()));
        }
        let usage = parsed.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });
        Ok((texts.concat(), usage))
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let body = Self::request_body(model, request);
        let trace = Trace::start_now().provider("anthropic").model(model);
        tracing::debug!(provider = "anthropic", model, messages = request.messages.len(), "messages request");

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
