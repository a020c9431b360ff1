use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Trace data for a single provider round-trip within a task invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub start: SystemTime,

    pub end: SystemTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Provider that served the call (e.g. "openai").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model name (e.g. "gpt-4o-mini")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Request body as sent, without credentials.
    pub input: serde_json::Value,

    /// Completion text (or `null` when the call failed).
    pub output: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Trace {
    pub fn start_now() -> TraceBuilder {
        TraceBuilder {
            start: SystemTime::now(),
            id: None,
            provider: None,
            model: None,
            metadata: None,
        }
    }
}

pub struct TraceBuilder {
    start: SystemTime,
    id: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    metadata: Option<serde_json::Value>,
}

impl TraceBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn finish(
        self,
        input: serde_json::Value,
        output: serde_json::Value,
        usage: Option<TokenUsage>,
    ) -> Trace {
        self.close(input, output, usage, None)
    }

    pub fn finish_with_error(self, input: serde_json::Value, error: String) -> Trace {
        self.close(input, serde_json::Value::Null, None, Some(error))
    }

    fn close(
        self,
        input: serde_json::Value,
        output: serde_json::Value,
        usage: Option<TokenUsage>,
        error: Option<String>,
    ) -> Trace {
        let end = SystemTime::now();
        let duration_ms = end
            .duration_since(self.start)
            .ok()
            .map(|d| d.as_millis() as u64);

        Trace {
            id: self.id,
            start: self.start,
            end,
            duration_ms,
            provider: self.provider,
            model: self.model,
            input,
            output,
            usage,
            metadata: self.metadata,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_builder() {
        let trace = Trace::start_now()
            .provider("openai")
            .model("gpt-4o-mini")
            .id("trace-1")
            .finish(
                json!({"messages": [{"role": "user", "content": "Hello"}]}),
                json!("Hi there!"),
                Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                    total_tokens: 15,
                }),
            );

        assert_eq!(trace.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(trace.provider.as_deref(), Some("openai"));
        assert!(trace.duration_ms.is_some());
        assert!(trace.error.is_none());
    }

    #[test]
    fn test_trace_with_error_has_null_output() {
        let trace = Trace::start_now()
            .model("claude-3-haiku")
            .finish_with_error(json!({}), "HTTP 401".to_string());
        assert!(trace.output.is_null());
        assert_eq!(trace.error.as_deref(), Some("HTTP 401"));
    }
}
