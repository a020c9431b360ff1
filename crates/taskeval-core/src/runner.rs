use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use taskeval_types::{CaseResult, EvalResult, RunStatus, TestCase};

use crate::datasource::DataSource;
use crate::scorer::score;
use crate::tasks::Harness;
use crate::trace::scope_traces;

pub struct EvalBuilder {
	data_source: Option<Arc<dyn DataSource>>,
	harness: Option<Arc<Harness>>,
	models: Vec<String>,
	concurrency: usize,
}

impl EvalBuilder {
	pub fn new() -> Self {
		Self {
			data_source: None,
			harness: None,
			models: Vec::new(),
			concurrency: 8,
		}
	}

	pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
		self.data_source = Some(data_source);
		self
	}

	pub fn harness(mut self, harness: Arc<Harness>) -> Self {
		self.harness = Some(harness);
		self
	}

	pub fn models<I, S>(mut self, models: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.models = models.into_iter().map(Into::into).collect();
		self
	}

	pub fn add_model(mut self, model: impl Into<String>) -> Self {
		self.models.push(model.into());
		self
	}

	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn build(self) -> Result<Eval> {
		if self.models.is_empty() {
			anyhow::bail!("at least one model must be set");
		}
		Ok(Eval {
			data_source: self.data_source.ok_or_else(|| anyhow::anyhow!("data_source must be set"))?,
			harness: self.harness.ok_or_else(|| anyhow::anyhow!("harness must be set"))?,
			models: self.models,
			concurrency: self.concurrency,
		})
	}
}

impl Default for EvalBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Runs every test case against every model and scores the outputs.
pub struct Eval {
	data_source: Arc<dyn DataSource>,
	harness: Arc<Harness>,
	models: Vec<String>,
	concurrency: usize,
}

impl Eval {
	pub fn builder() -> EvalBuilder {
		EvalBuilder::new()
	}

	pub async fn run(&self) -> Result<EvalResult> {
		let cases = self.data_source.load().await?;
		tracing::info!(cases = cases.len(), models = self.models.len(), "starting evaluation");
		let results = self.run_cases(cases).await;
		Ok(EvalResult::new(results))
	}

	/// Results come back in (case, model) order regardless of completion order.
	pub async fn run_cases(&self, cases: Vec<TestCase>) -> Vec<CaseResult> {
		let jobs: Vec<(usize, Arc<TestCase>, String)> = cases
			.into_iter()
			.map(Arc::new)
			.flat_map(|case| self.models.iter().map(move |model| (case.clone(), model.clone())))
			.enumerate()
			.map(|(order, (case, model))| (order, case, model))
			.collect();

		let harness = self.harness.clone();
		let stream = stream::iter(jobs).map(move |(order, case, model)| {
			let harness = harness.clone();
			async move { (order, run_one(&harness, &case, model).await) }
		});

		let mut results: Vec<(usize, CaseResult)> = stream
			.buffer_unordered(self.concurrency)
			.collect()
			.await;
		results.sort_by_key(|(order, _)| *order);
		results.into_iter().map(|(_, result)| result).collect()
	}
}

async fn run_one(harness: &Harness, case: &TestCase, model: String) -> CaseResult {
	let created_at = Utc::now();
	let started = Instant::now();
	let (outcome, traces) = scope_traces(harness.execute(&case.input, &model)).await;
	let execution_time_ms = started.elapsed().as_millis() as u64;

	let mut result = CaseResult {
		case_id: case.id.clone(),
		name: case.name.clone(),
		task_type: case.task_type(),
		model_name: model,
		status: RunStatus::Failed,
		output: None,
		score: None,
		metrics: None,
		error: None,
		execution_time_ms,
		created_at,
		traces,
	};
	let label = case.id.as_deref().or(case.name.as_deref()).unwrap_or("-");

	match outcome {
		Ok(output) => match score(&output, &case.expected) {
			Ok(metrics) => {
				let primary = metrics.primary_score();
				tracing::info!(case = label, model = %result.model_name, score = primary, "case completed");
				result.status = RunStatus::Completed;
				result.score = Some(primary);
				result.metrics = Some(metrics);
				result.output = Some(output);
			}
			Err(err) => {
				tracing::warn!(case = label, model = %result.model_name, error = %err, "case could not be scored");
				result.error = Some(err.to_string());
				result.output = Some(output);
			}
		},
		Err(err) => {
			tracing::warn!(case = label, model = %result.model_name, error = %err, "case failed");
			result.error = Some(err.to_string());
		}
	}
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::datasource::VecDataSource;
	use crate::retrieval::DocumentStore;
	use taskeval_types::{ClassificationInput, ClassificationOutput, TaskInput, TaskOutput};

	fn case(id: &str, text: &str) -> TestCase {
		TestCase::with_id(
			id,
			TaskInput::Classification(ClassificationInput { text: text.into(), labels: None }),
			TaskOutput::Classification(ClassificationOutput {
				predicted_label: "positive".into(),
				confidence: 0.9,
				probabilities: None,
			}),
		)
	}

	fn harness() -> Arc<Harness> {
		Arc::new(Harness::builder().documents(DocumentStore::new()).build())
	}

	#[tokio::test]
	async fn test_matrix_in_case_model_order() {
		let data = Arc::new(VecDataSource::new(vec![case("a", "good"), case("b", "bad"), case("c", "meh")]));
		let eval = Eval::builder()
			.data_source(data)
			.harness(harness())
			.models(["local-mock", "gpt-4o-mini"])
			.concurrency(3)
			.build()
			.unwrap();

		let result = eval.run().await.unwrap();
		let order: Vec<(&str, &str)> = result
			.cases
			.iter()
			.map(|c| (c.case_id.as_deref().unwrap(), c.model_name.as_str()))
			.collect();
		assert_eq!(
			order,
			[
				("a", "local-mock"),
				("a", "gpt-4o-mini"),
				("b", "local-mock"),
				("b", "gpt-4o-mini"),
				("c", "local-mock"),
				("c", "gpt-4o-mini"),
			]
		);

		// No OpenAI key configured: every gpt- run fails, every mock run scores.
		assert_eq!(result.summary.total, 6);
		assert_eq!(result.summary.completed, 3);
		assert_eq!(result.summary.failed, 3);
		let failed = &result.cases[1];
		assert_eq!(failed.status, RunStatus::Failed);
		assert!(failed.output.is_none() && failed.metrics.is_none());
		assert_eq!(failed.error.as_deref(), Some("OpenAI API key not configured"));

		let completed = &result.cases[0];
		assert!(completed.is_completed());
		let score = completed.score.unwrap();
		assert!(score == 0.0 || score == 1.0);
		assert!(completed.traces.is_empty());
	}

	#[test]
	fn test_builder_requires_parts() {
		let err = Eval::builder().harness(harness()).add_model("m").build().err().unwrap();
		assert!(err.to_string().contains("data_source"));

		let data = Arc::new(VecDataSource::new(Vec::new()));
		let err = Eval::builder().data_source(data).harness(harness()).build().err().unwrap();
		assert!(err.to_string().contains("model"));
	}
}
