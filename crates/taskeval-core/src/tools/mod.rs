//! Tool registry for agent tasks.

pub mod builtin;
pub mod calculator;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use taskeval_types::{ToolCall, ToolExecutionRecord};

use crate::error::ToolError;

/// A declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub required: bool,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self { name, required: true }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, required: false }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &[Param];

    /// Run the tool. Arguments have already been checked against
    /// `parameters()`.
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError>;
}

/// Named tools in listing order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `web_search`, `calculator`, `text_analyzer`, `file_reader`, `api_caller`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::WebSearch));
        registry.register(Arc::new(builtin::Calculator));
        registry.register(Arc::new(builtin::TextAnalyzer));
        registry.register(Arc::new(builtin::FileReader));
        registry.register(Arc::new(builtin::ApiCaller));
        registry
    }

    /// Add a tool, replacing any existing tool of the same name in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name())
    }

    /// `(name, description)` pairs in listing order.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.tools
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    /// Execute one call. Failures (unknown tool, bad arguments, a tool
    /// error) are recorded on the returned record, never raised.
    pub async fn execute(&self, call: ToolCall) -> ToolExecutionRecord {
        let Some(tool) = self.get(&call.tool) else {
            let message = format!("unknown tool: {}", call.tool);
            return ToolExecutionRecord::failed(call, message);
        };

        let outcome = match check_args(tool.parameters(), &call.args) {
            Ok(()) => tool.call(&call.args).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                tracing::debug!(tool = %call.tool, "tool call succeeded");
                ToolExecutionRecord::succeeded(call, result)
            }
            Err(err) => {
                tracing::warn!(tool = %call.tool, error = %err, "tool call failed");
                ToolExecutionRecord::failed(call, err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn check_args(params: &[Param], args: &Map<String, Value>) -> Result<(), ToolError> {
    if let Some(unexpected) = args.keys().find(|k| !params.iter().any(|p| p.name == k.as_str())) {
        return Err(ToolError::UnexpectedArgument(unexpected.clone()));
    }
    match params
        .iter()
        .find(|p| p.required && args.get(p.name).map_or(true, Value::is_null))
    {
        Some(missing) => Err(ToolError::MissingArgument(missing.name)),
        None => Ok(()),
    }
}

/// Text form of an argument: strings verbatim, other values as JSON.
pub fn arg_text(args: &Map<String, Value>, name: &'static str) -> Option<String> {
    args.get(name).filter(|v| !v.is_null()).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

pub fn required_text(args: &Map<String, Value>, name: &'static str) -> Result<String, ToolError> {
    arg_text(args, name).ok_or(ToolError::MissingArgument(name))
}
