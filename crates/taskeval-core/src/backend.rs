use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution strategy a model name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// OpenAI-compatible chat completions.
    Primary,
    /// Anthropic messages.
    Secondary,
    /// Offline, deterministic fabricated output.
    Fallback,
}

impl Backend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the prefix table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub backend: Backend,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, backend: Backend) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
        }
    }
}

/// Maps model names to backends by exact, case-sensitive prefix. Rules are
/// tried in order; the first match wins and anything unmatched falls back.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    rules: Vec<RouteRule>,
}

impl BackendSelector {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn default_rules() -> Vec<RouteRule> {
        vec![
            RouteRule::new("gpt-", Backend::Primary),
            RouteRule::new("claude-", Backend::Secondary),
        ]
    }

    /// Append a rule. Earlier rules keep precedence.
    pub fn with_prefix(mut self, prefix: impl Into<String>, backend: Backend) -> Self {
        self.rules.push(RouteRule::new(prefix, backend));
        self
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn select(&self, model_name: &str) -> Backend {
        self.rules
            .iter()
            .find(|rule| model_name.starts_with(rule.prefix.as_str()))
            .map(|rule| rule.backend)
            .unwrap_or(Backend::Fallback)
    }
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
