//! The tool-invocation loop.
//!
//! ```text
//! Planning ──► Executing ──► Synthesizing        (at least one tool ran)
//!                      └───► SynthesizingSkip    (no usable call blocks)
//! ```
//!
//! Tool calls are written by the model as
//! `[TOOL_CALL] {"tool": "<name>", "args": {..}} [/TOOL_CALL]` blocks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use taskeval_types::{AgentInput, AgentOutput, ToolCall, ToolExecutionRecord};

use super::{complete, prefix_chars, Route};
use crate::error::ExecutionError;
use crate::extract::extract_text;
use crate::provider::{ChatMessage, CompletionRequest, ProviderClient};
use crate::tools::ToolRegistry;

pub const TOOL_CALL_OPEN: &str = "[TOOL_CALL]";
pub const TOOL_CALL_CLOSE: &str = "[/TOOL_CALL]";

/// Results longer than this (in characters) earn a confidence bonus.
const LENGTH_BONUS_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Planning,
    Executing,
    Synthesizing,
    SynthesizingSkip,
}

pub(crate) async fn run(
    tools: &ToolRegistry,
    route: &Route,
    model: &str,
    input: &AgentInput,
) -> Result<AgentOutput, ExecutionError> {
    match route {
        Route::Provider(client) => {
            let (output, phase) = run_loop(tools, client.as_ref(), model, input).await?;
            tracing::debug!(?phase, actions = output.actions_taken.len(), "agent finished");
            Ok(output)
        }
        Route::Fallback => Ok(fallback(tools, input).await),
    }
}

/// Drive the loop to a terminal phase.
pub(crate) async fn run_loop(
    tools: &ToolRegistry,
    client: &dyn ProviderClient,
    model: &str,
    input: &AgentInput,
) -> Result<(AgentOutput, AgentPhase), ExecutionError> {
    let system = system_prompt(tools, input);
    let user_message = user_message(input);

    let mut phase = AgentPhase::Planning;
    let mut plan = String::new();
    let mut actions: Vec<ToolExecutionRecord> = Vec::new();

    let result = loop {
        match phase {
            AgentPhase::Planning => {
                let request = CompletionRequest::new(system.clone(), vec![ChatMessage::user(user_message.clone())])
                    .temperature(0.3)
                    .max_tokens(1500);
                plan = complete(client, model, &request).await?;
                phase = AgentPhase::Executing;
            }
            AgentPhase::Executing => {
                for call in parse_tool_calls(&plan) {
                    if !tools.contains(&call.tool) || !input.allows(&call.tool) {
                        tracing::debug!(tool = %call.tool, "skipping call to unavailable tool");
                        continue;
                    }
                    actions.push(tools.execute(call).await);
                }
                phase = if actions.is_empty() {
                    AgentPhase::SynthesizingSkip
                } else {
                    AgentPhase::Synthesizing
                };
            }
            AgentPhase::Synthesizing => {
                let request = CompletionRequest::new(
                    system.clone(),
                    vec![
                        ChatMessage::user(user_message.clone()),
                        ChatMessage::assistant(plan.clone()),
                        ChatMessage::user(results_message(&actions)),
                    ],
                )
                .temperature(0.3)
                .max_tokens(1000);
                let raw = complete(client, model, &request).await?;
                break extract_text(&raw, "result");
            }
            AgentPhase::SynthesizingSkip => break std::mem::take(&mut plan),
        }
    };

    let confidence = agent_confidence(&result, &actions);
    Ok((
        AgentOutput {
            result,
            actions_taken: actions,
            confidence,
        },
        phase,
    ))
}

fn system_prompt(tools: &ToolRegistry, input: &AgentInput) -> String {
    let listing = tools
        .describe()
        .into_iter()
        .filter(|(name, _)| input.allows(name))
        .map(|(name, description)| format!("- {name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an intelligent AI assistant that can use tools to complete complex tasks.\n\n\
         Your workflow:\n\
         1. Analyze the user's task\n\
         2. Decide which tools are needed\n\
         3. Call the tools in order\n\
         4. Combine the results into a final answer\n\n\
         Available tools:\n{listing}\n\n\
         Tool call format:\n\
         {TOOL_CALL_OPEN}\n\
         {{\n    \"tool\": \"tool name\",\n    \"args\": {{\n        \"parameter\": \"value\"\n    }}\n}}\n\
         {TOOL_CALL_CLOSE}\n\n\
         Choose the tools the task needs and call them using exactly this format."
    )
}

fn user_message(input: &AgentInput) -> String {
    let mut message = format!("Task: {}", input.goal);
    if let Some(context) = input.context.as_ref().filter(|c| !c.is_empty()) {
        let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
        message.push_str(&format!("\n\nContext:\n{rendered}"));
    }
    message.push_str("\n\nAnalyze the task, use the tools you need, and give a detailed solution.");
    message
}

fn results_message(actions: &[ToolExecutionRecord]) -> String {
    let lines = actions
        .iter()
        .map(|a| format!("Tool {} returned: {}", a.tool, a.outcome()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Tool results:\n{lines}\n\nGive the final answer based on these results.")
}

/// Every well-formed call block in `text`, in order. Blocks that are not a
/// JSON object with a string `tool` (and an object `args`, if present) are
/// dropped.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| {
        Regex::new(r"(?s)\[TOOL_CALL\](.*?)\[/TOOL_CALL\]").expect("tool call pattern is valid")
    });

    block
        .captures_iter(text)
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str().trim();
            match serde_json::from_str::<ToolCall>(body) {
                Ok(call) => Some(call),
                Err(err) => {
                    tracing::debug!(error = %err, "dropping malformed tool call block");
                    None
                }
            }
        })
        .collect()
}

/// 0.7, shifted by `(success_rate - 0.5) * 0.3` when any call ran, plus 0.1
/// for a result over the length threshold; clamped to [0.1, 0.95].
pub fn agent_confidence(result: &str, actions: &[ToolExecutionRecord]) -> f64 {
    let mut confidence = 0.7;
    if !actions.is_empty() {
        let succeeded = actions.iter().filter(|a| a.is_success()).count();
        let success_rate = succeeded as f64 / actions.len() as f64;
        confidence += (success_rate - 0.5) * 0.3;
    }
    if result.chars().count() > LENGTH_BONUS_THRESHOLD {
        confidence += 0.1;
    }
    confidence.clamp(0.1, 0.95)
}

/// Offline run: takes the first two tools of an explicit allow-list and
/// exercises the registered ones with canned arguments.
async fn fallback(tools: &ToolRegistry, input: &AgentInput) -> AgentOutput {
    let mut actions = Vec::new();
    let allowed = input.tools.as_deref().unwrap_or_default();

    for name in allowed.iter().take(2) {
        if !tools.contains(name) {
            continue;
        }
        let record = match name.as_str() {
            "calculator" => tools.execute(canned_call(name, json!({"expression": "2+2"}))).await,
            "text_analyzer" => {
                let text = prefix_chars(&input.goal, 100);
                tools.execute(canned_call(name, json!({"text": text}))).await
            }
            _ => ToolExecutionRecord::succeeded(
                canned_call(name, json!({})),
                format!("Simulated result of the {name} tool"),
            ),
        };
        actions.push(record);
    }

    let result = format!(
        "I analyzed the task '{}...' and used {} tools to complete it. \
         Based on the results, my recommendation is...",
        prefix_chars(&input.goal, 50),
        actions.len()
    );
    let confidence = agent_confidence(&result, &actions);
    AgentOutput {
        result,
        actions_taken: actions,
        confidence,
    }
}

fn canned_call(tool: &str, args: Value) -> ToolCall {
    ToolCall {
        tool: tool.to_string(),
        args: match args {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    }
}
