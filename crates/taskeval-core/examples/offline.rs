use std::sync::Arc;

use serde_json::json;
use taskeval_core::{
    score, Eval, Harness, JsonlDataSource, TaskInput, TaskKind, TaskOutput, TestCase, VecDataSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Any model name without a known prefix runs on the offline backend.
    let harness = Arc::new(Harness::builder().build());

    // Example 1: a single task, scored by hand
    let input = TaskInput::from_value(
        TaskKind::Correction,
        json!({"text": "I will recieve teh parcel tomorrow.", "correction_type": "spelling"}),
    )?;
    let expected = TaskOutput::from_value(
        TaskKind::Correction,
        json!({"corrected_text": "I will receive the parcel tomorrow.", "corrections": [], "confidence": 0.9}),
    )?;
    let output = harness.execute(&input, "local-mock").await?;
    let metrics = score(&output, &expected)?;
    println!("{} = {:.3}", metrics.primary_key(), metrics.primary_score());

    // Example 2: inline cases through the runner
    let cases = vec![TestCase::with_id(
        "agent-0",
        TaskInput::from_value(
            TaskKind::Agent,
            json!({"task": "Count the words in this sentence", "tools": ["text_analyzer", "calculator"]}),
        )?,
        TaskOutput::from_value(TaskKind::Agent, json!({"result": "6 words", "confidence": 0.8}))?,
    )];
    let eval = Eval::builder()
        .data_source(Arc::new(VecDataSource::new(cases)))
        .harness(harness.clone())
        .models(["local-mock", "offline-b"])
        .build()?;
    println!("{}", eval.run().await?.summary_table());

    // Example 3: load from JSONL file if provided
    if let Some(path) = std::env::args().nth(1) {
        let eval = Eval::builder()
            .data_source(Arc::new(JsonlDataSource::new(path)))
            .harness(harness)
            .add_model("local-mock")
            .build()?;
        println!("{}", eval.run().await?.summary_table());
    }

    Ok(())
}
