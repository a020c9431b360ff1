//! The fixed tool set. Everything except `calculator` and `text_analyzer`
//! is simulated and performs no I/O.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{arg_text, calculator, required_text, Param, Tool};
use crate::error::ToolError;

pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information"
    }

    fn parameters(&self) -> &[Param] {
        const PARAMS: &[Param] = &[Param::required("query"), Param::optional("num_results")];
        PARAMS
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let query = required_text(args, "query")?;
        let num_results = match args.get("num_results") {
            None | Some(Value::Null) => 5,
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| invalid_count(n))?,
            Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid_count(s))?,
            Some(other) => return Err(invalid_count(other)),
        };
        Ok(format!(
            "Search results for '{query}': found {num_results} relevant results (simulated)"
        ))
    }
}

fn invalid_count(value: impl std::fmt::Display) -> ToolError {
    ToolError::InvalidArgument {
        name: "num_results",
        reason: format!("expected a non-negative integer, got {value}"),
    }
}

pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate arithmetic expressions"
    }

    fn parameters(&self) -> &[Param] {
        const PARAMS: &[Param] = &[Param::required("expression")];
        PARAMS
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let expression = required_text(args, "expression")?;
        let result = calculator::evaluate(&expression)?;
        Ok(format!("{expression} = {result}"))
    }
}

pub struct TextAnalyzer;

#[async_trait]
impl Tool for TextAnalyzer {
    fn name(&self) -> &str {
        "text_analyzer"
    }

    fn description(&self) -> &str {
        "Analyze text content"
    }

    fn parameters(&self) -> &[Param] {
        const PARAMS: &[Param] = &[Param::required("text")];
        PARAMS
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let text = required_text(args, "text")?;
        Ok(format!(
            "Text analysis: {} characters, {} words",
            text.chars().count(),
            text.split_whitespace().count()
        ))
    }
}

pub struct FileReader;

#[async_trait]
impl Tool for FileReader {
    fn name(&self) -> &str {
        "file_reader"
    }

    fn description(&self) -> &str {
        "Read file contents"
    }

    fn parameters(&self) -> &[Param] {
        const PARAMS: &[Param] = &[Param::required("file_path")];
        PARAMS
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let path = required_text(args, "file_path")?;
        Ok(format!("Contents of file '{path}' (simulated)"))
    }
}

pub struct ApiCaller;

#[async_trait]
impl Tool for ApiCaller {
    fn name(&self) -> &str {
        "api_caller"
    }

    fn description(&self) -> &str {
        "Call an external API"
    }

    fn parameters(&self) -> &[Param] {
        const PARAMS: &[Param] = &[
            Param::required("url"),
            Param::optional("method"),
            Param::optional("data"),
        ];
        PARAMS
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let url = required_text(args, "url")?;
        let method = arg_text(args, "method")
            .map(|m| m.to_uppercase())
            .unwrap_or_else(|| "GET".to_string());
        Ok(format!("Response from {method} {url} (simulated)"))
    }
}
