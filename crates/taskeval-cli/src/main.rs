use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use taskeval_core::{score, Eval, EvalConfig, Harness, JsonlDataSource, TaskInput, TaskKind, TaskOutput, ToolRegistry};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "taskeval", about = "Evaluate generative-AI backends on classification, correction, dialogue, RAG and agent tasks")]
struct Cli {
	/// Log line format (logs go to stderr; RUST_LOG overrides the level)
	#[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
	log_format: LogFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
	Text,
	Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Run a JSONL suite against one or more models
	Run(RunArgs),
	/// Execute a single task and print its output
	Exec(ExecArgs),
	/// List the built-in tools available to agent tasks
	Tools,
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	/// YAML config file
	#[arg(long)]
	config: Option<PathBuf>,

	/// JSONL suite: { "id"?, "name"?, "task_type", "input", "expected" } per line (overrides config)
	#[arg(long)]
	data: Option<PathBuf>,

	/// Model to evaluate; repeat for several (overrides config)
	#[arg(long = "model")]
	models: Vec<String>,

	/// Invocations in flight
	#[arg(long)]
	concurrency: Option<usize>,

	/// Output JSON result to a file
	#[arg(long)]
	json_out: Option<PathBuf>,

	/// Exit non-zero when the average score falls below this value
	#[arg(long)]
	min_avg_score: Option<f64>,
}

#[derive(Debug, Clone, Parser)]
struct ExecArgs {
	/// YAML config file
	#[arg(long)]
	config: Option<PathBuf>,

	/// classification, correction, dialogue, rag or agent
	#[arg(long, value_parser = parse_kind)]
	task_type: TaskKind,

	/// Task input as a JSON object
	#[arg(long)]
	input: String,

	#[arg(long)]
	model: String,

	/// Expected output as a JSON object; prints metrics when given
	#[arg(long)]
	expected: Option<String>,
}

fn parse_kind(value: &str) -> Result<TaskKind, String> {
	value.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	init_tracing(cli.log_format);
	match cli.command {
		Commands::Run(args) => run(args).await?,
		Commands::Exec(args) => exec(args).await?,
		Commands::Tools => list_tools(),
	}
	Ok(())
}

fn init_tracing(format: LogFormat) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
	match format {
		LogFormat::Json => tracing_subscriber::registry().with(env_filter).with(layer.json()).try_init().ok(),
		LogFormat::Text => tracing_subscriber::registry().with(env_filter).with(layer).try_init().ok(),
	};
}

fn load_config(path: Option<&PathBuf>) -> Result<EvalConfig> {
	match path {
		Some(path) => EvalConfig::load(path),
		None => Ok(EvalConfig::default()),
	}
}

async fn run(args: RunArgs) -> Result<()> {
	let config = load_config(args.config.as_ref())?;

	let data_path = args
		.data
		.or_else(|| config.data.as_ref().map(|d| d.path.clone()))
		.context("no suite given: pass --data or set data.path in the config")?;
	let models = if args.models.is_empty() { config.models.clone() } else { args.models };
	let concurrency = args.concurrency.unwrap_or(config.concurrency);

	let harness = Arc::new(Harness::from_config(&config)?);
	let eval = Eval::builder()
		.data_source(Arc::new(JsonlDataSource::new(&data_path)))
		.harness(harness)
		.models(models)
		.concurrency(concurrency)
		.build()?;

	let result = eval.run().await?;
	println!("{}", result.summary_table());

	if let Some(path) = args.json_out {
		let json = serde_json::to_string_pretty(&result)?;
		tokio::fs::write(&path, json)
			.await
			.with_context(|| format!("Failed to write {:?}", path))?;
	}

	if let Some(min) = args.min_avg_score {
		if result.summary.avg_score < min {
			anyhow::bail!(
				"average score {:.3} is below threshold {:.3}",
				result.summary.avg_score,
				min
			);
		}
	}
	Ok(())
}

async fn exec(args: ExecArgs) -> Result<()> {
	let config = load_config(args.config.as_ref())?;

	let mut raw: Value = serde_json::from_str(&args.input).context("--input is not valid JSON")?;
	if args.task_type == TaskKind::Rag {
		if let Some(object) = raw.as_object_mut() {
			object
				.entry("top_k")
				.or_insert_with(|| config.retrieval.default_top_k.into());
		}
	}
	let input = TaskInput::from_value(args.task_type, raw)
		.with_context(|| format!("invalid {} input", args.task_type))?;

	let harness = Harness::from_config(&config)?;
	let output = harness.execute(&input, &args.model).await?;
	println!("{}", serde_json::to_string_pretty(&output.payload_value()?)?);

	if let Some(expected) = args.expected {
		let value: Value = serde_json::from_str(&expected).context("--expected is not valid JSON")?;
		let expected = TaskOutput::from_value(args.task_type, value)
			.with_context(|| format!("invalid {} expected output", args.task_type))?;
		let metrics = score(&output, &expected)?;
		println!("\n{}: {:.3}", metrics.primary_key(), metrics.primary_score());
		for (name, value) in metrics.iter().filter(|(name, _)| *name != metrics.primary_key()) {
			println!("  {name}: {value}");
		}
	}
	Ok(())
}

fn list_tools() {
	let registry = ToolRegistry::builtin();
	for (name, description) in registry.describe() {
		println!("{name:<14} {description}");
	}
}
