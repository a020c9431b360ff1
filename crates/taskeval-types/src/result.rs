use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::{Table, Tabled};

use crate::metrics::MetricsMap;
use crate::task::{TaskInput, TaskKind, TaskOutput};
use crate::trace::Trace;

/// A stored task plus the output it is expected to produce.
///
/// Serialized flat, the way suites are written on disk:
/// `{"id": .., "name": .., "task_type": "rag", "input": {..}, "expected": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTestCase", into = "RawTestCase")]
pub struct TestCase {
	pub id: Option<String>,
	pub name: Option<String>,
	pub input: TaskInput,
	pub expected: TaskOutput,
}

impl TestCase {
	pub fn new(input: TaskInput, expected: TaskOutput) -> Self {
		Self { id: None, name: None, input, expected }
	}

	pub fn with_id(id: impl Into<String>, input: TaskInput, expected: TaskOutput) -> Self {
		Self { id: Some(id.into()), name: None, input, expected }
	}

	pub fn task_type(&self) -> TaskKind {
		self.input.kind()
	}
}

#[derive(Serialize, Deserialize)]
struct RawTestCase {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	name: Option<String>,
	task_type: TaskKind,
	input: Value,
	expected: Value,
}

impl TryFrom<RawTestCase> for TestCase {
	type Error = String;

	fn try_from(raw: RawTestCase) -> Result<Self, Self::Error> {
		let input = TaskInput::from_value(raw.task_type, raw.input)
			.map_err(|e| format!("invalid {} input: {e}", raw.task_type))?;
		let expected = TaskOutput::from_value(raw.task_type, raw.expected)
			.map_err(|e| format!("invalid {} expected output: {e}", raw.task_type))?;
		Ok(Self { id: raw.id, name: raw.name, input, expected })
	}
}

impl From<TestCase> for RawTestCase {
	fn from(case: TestCase) -> Self {
		Self {
			id: case.id,
			name: case.name,
			task_type: case.input.kind(),
			input: case.input.payload_value().unwrap_or_default(),
			expected: case.expected.payload_value().unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Completed,
	Failed,
}

/// Outcome of running one test case against one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub case_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	pub task_type: TaskKind,
	pub model_name: String,
	pub status: RunStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output: Option<TaskOutput>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metrics: Option<MetricsMap>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub execution_time_ms: u64,
	pub created_at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub traces: Vec<Trace>,
}

impl CaseResult {
	pub fn is_completed(&self) -> bool {
		self.status == RunStatus::Completed
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
	pub total: usize,
	pub completed: usize,
	pub failed: usize,
	pub success_rate: f64,
	pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
	pub cases: Vec<CaseResult>,
	pub summary: EvalSummary,
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
	id: String,
	task: String,
	model: String,
	status: String,
	score: String,
	output: String,
}

impl EvalResult {
	pub fn new(cases: Vec<CaseResult>) -> Self {
		let summary = Self::summarize(&cases);
		Self { cases, summary }
	}

	pub fn summarize(cases: &[CaseResult]) -> EvalSummary {
		let total = cases.len();
		let completed = cases.iter().filter(|c| c.is_completed()).count();
		let scores: Vec<f64> = cases.iter().filter_map(|c| c.score).collect();

		let success_rate = if total == 0 { 0.0 } else { completed as f64 / total as f64 };
		let avg_score = if scores.is_empty() {
			0.0
		} else {
			scores.iter().sum::<f64>() / scores.len() as f64
		};

		EvalSummary { total, completed, failed: total - completed, success_rate, avg_score }
	}

	pub fn summary_table(&self) -> String {
		let rows: Vec<SummaryRow> = self.cases.iter().map(|cr| {
			let output = match (&cr.output, &cr.error) {
				(Some(output), _) => output.headline().to_string(),
				(None, Some(error)) => format!("error: {error}"),
				(None, None) => String::new(),
			};
			SummaryRow {
				id: cr.case_id.clone().or_else(|| cr.name.clone()).unwrap_or_else(|| "-".to_string()),
				task: cr.task_type.to_string(),
				model: cr.model_name.clone(),
				status: if cr.is_completed() { "✓" } else { "✗" }.to_string(),
				score: cr.score.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".to_string()),
				output: truncate(output.replace('\n', " "), 64),
			}
		}).collect();

		let table_str = Table::new(rows).to_string();

		let summary_text = format!(
			"Total: {}  Completed: {}  Failed: {}  Success rate: {:.1}%  Avg score: {:.3}",
			self.summary.total,
			self.summary.completed,
			self.summary.failed,
			self.summary.success_rate * 100.0,
			self.summary.avg_score
		);

		format!("{}\n\n{}\n", table_str, summary_text)
	}
}

fn truncate(s: String, max_len: usize) -> String {
	if s.chars().count() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::task::ClassificationOutput;
	use serde_json::json;

	fn case_result(status: RunStatus, score: Option<f64>) -> CaseResult {
		CaseResult {
			case_id: Some("c1".into()),
			name: None,
			task_type: TaskKind::Classification,
			model_name: "mock".into(),
			status,
			output: None,
			score,
			metrics: None,
			error: None,
			execution_time_ms: 3,
			created_at: Utc::now(),
			traces: Vec::new(),
		}
	}

	#[test]
	fn test_test_case_flat_format() {
		let case: TestCase = serde_json::from_value(json!({
			"id": "sentiment-1",
			"task_type": "classification",
			"input": {"text": "这个产品真的很棒", "labels": ["positive", "negative", "neutral"]},
			"expected": {"predicted_label": "positive", "confidence": 0.9}
		}))
		.unwrap();
		assert_eq!(case.task_type(), TaskKind::Classification);
		assert_eq!(case.id.as_deref(), Some("sentiment-1"));

		let back = serde_json::to_value(&case).unwrap();
		assert_eq!(back["task_type"], "classification");
		assert_eq!(back["expected"]["predicted_label"], "positive");
	}

	#[test]
	fn test_test_case_rejects_wrong_payload() {
		let err = serde_json::from_value::<TestCase>(json!({
			"task_type": "rag",
			"input": {"text": "no query field"},
			"expected": {"answer": "x", "confidence": 0.5}
		}))
		.unwrap_err();
		assert!(err.to_string().contains("invalid rag input"));
	}

	#[test]
	fn test_summarize_counts_failures() {
		let cases = vec![
			case_result(RunStatus::Completed, Some(1.0)),
			case_result(RunStatus::Completed, Some(0.5)),
			case_result(RunStatus::Failed, None),
		];
		let summary = EvalResult::summarize(&cases);
		assert_eq!(summary.total, 3);
		assert_eq!(summary.completed, 2);
		assert_eq!(summary.failed, 1);
		assert!((summary.avg_score - 0.75).abs() < 1e-9);
	}

	#[test]
	fn test_summary_table_mentions_totals() {
		let mut ok = case_result(RunStatus::Completed, Some(1.0));
		ok.output = Some(TaskOutput::Classification(ClassificationOutput {
			predicted_label: "positive".into(),
			confidence: 0.9,
			probabilities: None,
		}));
		let result = EvalResult::new(vec![ok]);
		let table = result.summary_table();
		assert!(table.contains("positive"));
		assert!(table.contains("Total: 1"));
	}
}
