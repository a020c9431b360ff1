use anyhow::Result;
use taskeval_types::EvalResult;

/// Assert the average score of completed runs meets a threshold.
///
/// Use this in your `#[tokio::test]` functions.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn test_smoke_suite() -> Result<()> {
///     let eval = Eval::builder()
///         .data_source(Arc::new(JsonlDataSource::new("suites/smoke.jsonl")))
///         .harness(Arc::new(Harness::from_config(&EvalConfig::default())?))
///         .models(["gpt-4o-mini"])
///         .build()?;
///
///     let result = eval.run().await?;
///     assert_eval_avg_score(&result, 0.7)?;
///     Ok(())
/// }
/// ```
pub fn assert_eval_avg_score(result: &EvalResult, min_avg_score: f64) -> Result<()> {
    if result.summary.avg_score < min_avg_score {
        anyhow::bail!(
            "Evaluation failed: avg score {:.3} is below threshold {:.3}\n{}",
            result.summary.avg_score,
            min_avg_score,
            result.summary_table()
        );
    }
    Ok(())
}

/// Assert the share of runs that completed meets a threshold.
pub fn assert_eval_success_rate(result: &EvalResult, min_success_rate: f64) -> Result<()> {
    if result.summary.success_rate < min_success_rate {
        anyhow::bail!(
            "Evaluation failed: success rate {:.1}% is below threshold {:.1}%\n{}",
            result.summary.success_rate * 100.0,
            min_success_rate * 100.0,
            result.summary_table()
        );
    }
    Ok(())
}

pub fn assert_eval_no_failures(result: &EvalResult) -> Result<()> {
    if result.summary.failed > 0 {
        anyhow::bail!(
            "Evaluation failed: {}/{} runs failed\n{}",
            result.summary.failed,
            result.summary.total,
            result.summary_table()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskeval_types::{CaseResult, RunStatus, TaskKind};

    fn run(status: RunStatus, score: Option<f64>) -> CaseResult {
        CaseResult {
            case_id: None,
            name: None,
            task_type: TaskKind::Dialogue,
            model_name: "local-mock".into(),
            status,
            output: None,
            score,
            metrics: None,
            error: None,
            execution_time_ms: 0,
            created_at: Utc::now(),
            traces: Vec::new(),
        }
    }

    #[test]
    fn test_thresholds() {
        let result = EvalResult::new(vec![
            run(RunStatus::Completed, Some(0.8)),
            run(RunStatus::Completed, Some(0.6)),
            run(RunStatus::Failed, None),
        ]);
        assert!(assert_eval_avg_score(&result, 0.7).is_ok());
        assert!(assert_eval_avg_score(&result, 0.75).is_err());
        assert!(assert_eval_success_rate(&result, 0.6).is_ok());
        let err = assert_eval_no_failures(&result).unwrap_err();
        assert!(err.to_string().contains("1/3 runs failed"));
    }
}
