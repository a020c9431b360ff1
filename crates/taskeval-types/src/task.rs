use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The five task families the harness knows how to execute and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Correction,
    Dialogue,
    Rag,
    Agent,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Classification,
        TaskKind::Correction,
        TaskKind::Dialogue,
        TaskKind::Rag,
        TaskKind::Agent,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Correction => "correction",
            Self::Dialogue => "dialogue",
            Self::Rag => "rag",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Self::Classification),
            "correction" => Ok(Self::Correction),
            "dialogue" => Ok(Self::Dialogue),
            "rag" => Ok(Self::Rag),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("unsupported task type: {value}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub text: String,
    /// Closed label set. Without one the task is sentiment analysis over
    /// positive / negative / neutral.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionInput {
    pub text: String,
    /// `grammar`, `spelling` or `style`. Anything else is treated as grammar.
    #[serde(default = "default_correction_type")]
    pub correction_type: String,
}

fn default_correction_type() -> String {
    "grammar".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl DialogueTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueInput {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<DialogueTurn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl DialogueInput {
    /// True when the caller supplied at least one prior turn.
    pub fn has_context(&self) -> bool {
        self.context.as_ref().is_some_and(|turns| !turns.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagInput {
    pub query: String,
    /// Inline candidate passages. When absent or empty, the shared document
    /// store is searched instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    #[serde(rename = "task")]
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Allow-list of tool names. `None` (or empty) permits the whole registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

impl AgentInput {
    pub fn allows(&self, tool: &str) -> bool {
        match &self.tools {
            Some(allowed) if !allowed.is_empty() => allowed.iter().any(|t| t == tool),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload", rename_all = "snake_case")]
pub enum TaskInput {
    Classification(ClassificationInput),
    Correction(CorrectionInput),
    Dialogue(DialogueInput),
    Rag(RagInput),
    Agent(AgentInput),
}

impl TaskInput {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Classification(_) => TaskKind::Classification,
            Self::Correction(_) => TaskKind::Correction,
            Self::Dialogue(_) => TaskKind::Dialogue,
            Self::Rag(_) => TaskKind::Rag,
            Self::Agent(_) => TaskKind::Agent,
        }
    }

    /// Parse a bare payload object (the `input` of a stored test case).
    pub fn from_value(kind: TaskKind, value: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            TaskKind::Classification => Self::Classification(serde_json::from_value(value)?),
            TaskKind::Correction => Self::Correction(serde_json::from_value(value)?),
            TaskKind::Dialogue => Self::Dialogue(serde_json::from_value(value)?),
            TaskKind::Rag => Self::Rag(serde_json::from_value(value)?),
            TaskKind::Agent => Self::Agent(serde_json::from_value(value)?),
        })
    }

    pub fn payload_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Classification(p) => serde_json::to_value(p),
            Self::Correction(p) => serde_json::to_value(p),
            Self::Dialogue(p) => serde_json::to_value(p),
            Self::Rag(p) => serde_json::to_value(p),
            Self::Agent(p) => serde_json::to_value(p),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub predicted_label: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// One edit reported by a correction backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrectionEdit {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub corrected: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Character offset of `original` in the source text, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOutput {
    pub corrected_text: String,
    #[serde(default)]
    pub corrections: Vec<CorrectionEdit>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueOutput {
    pub response: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<bool>,
}

/// A ranked passage. Sequences are ordered by descending `score`, ties by
/// ascending `index` (position in the candidate set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagOutput {
    pub answer: String,
    #[serde(default)]
    pub retrieved_documents: Vec<RetrievedPassage>,
    pub confidence: f64,
}

/// A tool invocation parsed out of model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
}

impl ToolExecutionRecord {
    pub fn succeeded(call: ToolCall, result: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            args: call.args,
            result: Some(result.into()),
            error: None,
            status: ToolStatus::Success,
        }
    }

    pub fn failed(call: ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            args: call.args,
            result: None,
            error: Some(error.into()),
            status: ToolStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// The result text, or the error message for a failed call.
    pub fn outcome(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub result: String,
    #[serde(default)]
    pub actions_taken: Vec<ToolExecutionRecord>,
    pub confidence: f64,
}

impl AgentOutput {
    pub fn tool_names(&self) -> BTreeSet<&str> {
        self.actions_taken.iter().map(|a| a.tool.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload", rename_all = "snake_case")]
pub enum TaskOutput {
    Classification(ClassificationOutput),
    Correction(CorrectionOutput),
    Dialogue(DialogueOutput),
    Rag(RagOutput),
    Agent(AgentOutput),
}

impl TaskOutput {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Classification(_) => TaskKind::Classification,
            Self::Correction(_) => TaskKind::Correction,
            Self::Dialogue(_) => TaskKind::Dialogue,
            Self::Rag(_) => TaskKind::Rag,
            Self::Agent(_) => TaskKind::Agent,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Classification(o) => o.confidence,
            Self::Correction(o) => o.confidence,
            Self::Dialogue(o) => o.confidence,
            Self::Rag(o) => o.confidence,
            Self::Agent(o) => o.confidence,
        }
    }

    /// The main textual field of the output (label, corrected text, reply,
    /// answer or agent result).
    pub fn headline(&self) -> &str {
        match self {
            Self::Classification(o) => &o.predicted_label,
            Self::Correction(o) => &o.corrected_text,
            Self::Dialogue(o) => &o.response,
            Self::Rag(o) => &o.answer,
            Self::Agent(o) => &o.result,
        }
    }

    /// Parse a bare payload object (the `expected` of a stored test case).
    pub fn from_value(kind: TaskKind, value: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            TaskKind::Classification => Self::Classification(serde_json::from_value(value)?),
            TaskKind::Correction => Self::Correction(serde_json::from_value(value)?),
            TaskKind::Dialogue => Self::Dialogue(serde_json::from_value(value)?),
            TaskKind::Rag => Self::Rag(serde_json::from_value(value)?),
            TaskKind::Agent => Self::Agent(serde_json::from_value(value)?),
        })
    }

    pub fn payload_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Classification(p) => serde_json::to_value(p),
            Self::Correction(p) => serde_json::to_value(p),
            Self::Dialogue(p) => serde_json::to_value(p),
            Self::Rag(p) => serde_json::to_value(p),
            Self::Agent(p) => serde_json::to_value(p),
        }
    }
}
