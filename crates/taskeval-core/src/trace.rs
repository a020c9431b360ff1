pub use taskeval_types::{TokenUsage, Trace, TraceBuilder};

use std::cell::RefCell;

tokio::task_local! {
    static TRACES: RefCell<Vec<Trace>>;
}

/// Run a future within a tracing scope and return the result along with the
/// provider traces reported while it ran.
pub async fn scope_traces<F, R>(f: F) -> (R, Vec<Trace>)
where
    F: std::future::Future<Output = R>,
{
    let traces = RefCell::new(Vec::new());
    TRACES
        .scope(traces, async move {
            let result = f.await;
            let collected = TRACES.with(|t| t.borrow().clone());
            (result, collected)
        })
        .await
}

/// Record a provider trace. Outside a scope this is a no-op.
pub fn report_trace(trace: Trace) {
    let _ = TRACES.try_with(|traces| {
        traces.borrow_mut().push(trace);
    });
}

pub fn get_traces() -> Vec<Trace> {
    TRACES
        .try_with(|traces| traces.borrow().clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_report_and_collect() {
        let ((), traces) = scope_traces(async {
            report_trace(Trace::start_now().model("gpt-4").finish(
                json!("input1"),
                json!("output1"),
                None,
            ));
            report_trace(Trace::start_now().model("claude-3").finish(
                json!("input2"),
                json!("output2"),
                None,
            ));
            assert_eq!(get_traces().len(), 2);
        })
        .await;

        assert_eq!(traces.len(), 2);
        assert_eq!(traces[1].model.as_deref(), Some("claude-3"));
    }

    #[tokio::test]
    async fn test_report_outside_scope_is_noop() {
        report_trace(Trace::start_now().finish(json!(null), json!(null), None));
        assert!(get_traces().is_empty());
    }
}
