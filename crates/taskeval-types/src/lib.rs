//! Value types shared across taskeval crates: task payloads, tool records,
//! retrieval passages, metrics, provider traces and evaluation results.

mod metrics;
mod result;
mod task;
mod trace;

pub use metrics::{MetricValue, MetricsMap};
pub use result::{CaseResult, EvalResult, EvalSummary, RunStatus, TestCase};
pub use task::{
	AgentInput, AgentOutput, ClassificationInput, ClassificationOutput, CorrectionEdit,
	CorrectionInput, CorrectionOutput, DialogueInput, DialogueOutput, DialogueTurn, RagInput,
	RagOutput, RetrievedPassage, TaskInput, TaskKind, TaskOutput, ToolCall, ToolExecutionRecord,
	ToolStatus,
};
pub use trace::{TokenUsage, Trace, TraceBuilder};
