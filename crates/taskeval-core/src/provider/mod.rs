//! Provider clients: one `complete` operation per text-generation service.
//!
//! Clients are constructed explicitly and injected into the harness; there
//! is no process-wide client state.

pub mod anthropic;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{ExecutionError, ProviderError};

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lenient mapping for caller-supplied dialogue roles; anything that is
    /// not `assistant` or `system` is treated as the user.
    pub fn parse_lenient(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: Some(system.into()),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Display name used in error messages and traces.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError>;
}

/// The configured provider clients. A missing client is only an error once
/// a task is actually routed to it.
#[derive(Clone, Default)]
pub struct Providers {
    primary: Option<Arc<dyn ProviderClient>>,
    secondary: Option<Arc<dyn ProviderClient>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.primary = Some(client);
        self
    }

    pub fn with_secondary(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.secondary = Some(client);
        self
    }

    pub fn is_configured(&self, backend: Backend) -> bool {
        match backend {
            Backend::Primary => self.primary.is_some(),
            Backend::Secondary => self.secondary.is_some(),
            Backend::Fallback => true,
        }
    }

    /// The client serving `backend`. `Fallback` has no client and is reported
    /// as a configuration error; callers route it before asking.
    pub fn client(&self, backend: Backend) -> Result<Arc<dyn ProviderClient>, ExecutionError> {
        let (slot, provider) = match backend {
            Backend::Primary => (self.primary.clone(), "OpenAI"),
            Backend::Secondary => (self.secondary.clone(), "Anthropic"),
            Backend::Fallback => (None, "fallback"),
        };
        slot.ok_or_else(|| ExecutionError::Configuration {
            provider: provider.to_string(),
        })
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("primary", &self.primary.as_ref().map(|c| c.name().to_string()))
            .field("secondary", &self.secondary.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

pub(crate) fn truncate_body(body: String) -> String {
    const MAX: usize = 512;
    if body.chars().count() <= MAX {
        return body;
    }
    body.chars().take(MAX).collect()
}
