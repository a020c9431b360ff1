use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use taskeval_types::TestCase;

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TestCase>>;
}

pub struct VecDataSource {
    cases: Vec<TestCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        Ok(self.cases.clone())
    }
}

/// Read JSONL where each line is one test case:
/// `{"id": "...", "name": "...", "task_type": "classification", "input": {..}, "expected": {..}}`
/// (`id` and `name` optional). Blank lines are skipped.
pub struct JsonlDataSource {
    path: PathBuf,
}

impl JsonlDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonlDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = tokio_fs_read_to_string(&self.path).await?;
        parse_jsonl(&content).with_context(|| format!("Failed to load {:?}", self.path))
    }
}

pub fn parse_jsonl(content: &str) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let case: TestCase = serde_json::from_str(line)
            .with_context(|| format!("Invalid test case on line {}", idx + 1))?;
        cases.push(case);
    }
    Ok(cases)
}

#[cfg(not(feature = "sync-fs"))]
async fn tokio_fs_read_to_string(path: &PathBuf) -> Result<String> {
    use tokio::fs;
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

#[cfg(feature = "sync-fs")]
async fn tokio_fs_read_to_string(path: &PathBuf) -> Result<String> {
    use std::fs;
    use tokio::task;
    let path_clone = path.clone();
    let content = task::spawn_blocking(move || {
        fs::read_to_string(&path_clone).with_context(|| format!("Failed to read {:?}", path_clone))
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))??;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskeval_types::{TaskInput, TaskKind, TaskOutput};

    const SUITE: &str = r#"
{"id": "c1", "task_type": "classification", "input": {"text": "这个产品真的很棒", "labels": ["positive", "negative", "neutral"]}, "expected": {"predicted_label": "positive", "confidence": 0.9}}

{"name": "agent smoke", "task_type": "agent", "input": {"task": "compute 2+2", "tools": ["calculator"]}, "expected": {"result": "4", "confidence": 0.8}}
"#;

    #[test]
    fn test_parse_jsonl() {
        let cases = parse_jsonl(SUITE).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id.as_deref(), Some("c1"));
        assert_eq!(cases[0].task_type(), TaskKind::Classification);
        assert_eq!(cases[1].name.as_deref(), Some("agent smoke"));
        match (&cases[1].input, &cases[1].expected) {
            (TaskInput::Agent(input), TaskOutput::Agent(expected)) => {
                assert_eq!(input.goal, "compute 2+2");
                assert!(expected.actions_taken.is_empty());
            }
            other => panic!("unexpected case: {other:?}"),
        }
    }

    #[test]
    fn test_errors_carry_line_number() {
        let content = "\n{\"task_type\": \"rag\", \"input\": {\"query\": \"q\"}, \"expected\": {\"answer\": \"a\", \"confidence\": 0.5}}\n{\"task_type\": \"summarize\", \"input\": {}, \"expected\": {}}\n";
        let err = parse_jsonl(content).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err:#}");

        let err = parse_jsonl("not json").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_jsonl_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("taskeval-suite-{}.jsonl", std::process::id()));
        std::fs::write(&path, SUITE).unwrap();
        let cases = JsonlDataSource::new(&path).load().await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cases.len(), 2);

        let missing = JsonlDataSource::new("/nonexistent/taskeval.jsonl").load().await;
        assert!(missing.is_err());
    }
}
