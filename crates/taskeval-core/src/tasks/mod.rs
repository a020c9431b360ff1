//! Task execution: backend selection, provider dispatch and output
//! normalisation for every task kind.

pub mod agent;
pub mod classification;
pub mod correction;
pub mod dialogue;
pub mod rag;

use std::sync::Arc;

use taskeval_types::{RetrievedPassage, TaskInput, TaskOutput};
use tracing::Instrument;

use crate::backend::{Backend, BackendSelector};
use crate::error::ExecutionError;
use crate::provider::{CompletionRequest, ProviderClient, Providers};
use crate::retrieval::{DocumentStore, Retriever};
use crate::tools::ToolRegistry;

/// How one invocation produces text.
#[derive(Clone)]
pub(crate) enum Route {
    Provider(Arc<dyn ProviderClient>),
    Fallback,
}

/// Inputs the offline backend derives its choices from.
pub(crate) struct Seed<'a> {
    pub model: &'a str,
    pub payload: String,
}

impl<'a> Seed<'a> {
    fn new(model: &'a str, input: &TaskInput) -> Self {
        Self {
            model,
            payload: input
                .payload_value()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn parts<'s>(&'s self, purpose: &'s str) -> [&'s str; 3] {
        [self.model, &self.payload, purpose]
    }
}

/// The execution engine. Cheap to share behind an `Arc`; holds no
/// per-invocation state.
#[derive(Debug)]
pub struct Harness {
    providers: Providers,
    selector: BackendSelector,
    tools: ToolRegistry,
    retriever: Retriever,
    documents: DocumentStore,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Run one task against `model`. Only configuration problems and provider
    /// call failures are returned as errors; everything else degrades into
    /// the output.
    pub async fn execute(&self, input: &TaskInput, model: &str) -> Result<TaskOutput, ExecutionError> {
        let backend = self.selector.select(model);
        let span = tracing::info_span!(
            "taskeval.execute",
            kind = %input.kind(),
            model,
            backend = %backend
        );

        async move {
            let route = match backend {
                Backend::Fallback => Route::Fallback,
                backend => Route::Provider(self.providers.client(backend)?),
            };
            let seed = Seed::new(model, input);

            let output = match input {
                TaskInput::Classification(input) => {
                    TaskOutput::Classification(classification::run(&route, model, input, &seed).await?)
                }
                TaskInput::Correction(input) => {
                    TaskOutput::Correction(correction::run(&route, model, input, &seed).await?)
                }
                TaskInput::Dialogue(input) => {
                    TaskOutput::Dialogue(dialogue::run(&route, model, input, &seed).await?)
                }
                TaskInput::Rag(input) => TaskOutput::Rag(rag::run(self, &route, model, input).await?),
                TaskInput::Agent(input) => {
                    TaskOutput::Agent(agent::run(&self.tools, &route, model, input).await?)
                }
            };
            tracing::debug!(confidence = output.confidence(), "task executed");
            Ok(output)
        }
        .instrument(span)
        .await
    }

    /// Rank the stored documents (optionally one collection) against `query`.
    pub async fn search_documents(
        &self,
        query: &str,
        collection: Option<&str>,
        top_k: usize,
    ) -> Vec<RetrievedPassage> {
        let documents = self.documents.documents(collection);
        self.retriever.retrieve(query, &documents, top_k).await
    }
}

pub struct HarnessBuilder {
    providers: Providers,
    selector: BackendSelector,
    tools: ToolRegistry,
    retriever: Retriever,
    documents: Option<DocumentStore>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            providers: Providers::new(),
            selector: BackendSelector::default(),
            tools: ToolRegistry::builtin(),
            retriever: Retriever::keyword(),
            documents: None,
        }
    }

    pub fn providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    pub fn primary(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.providers = self.providers.with_primary(client);
        self
    }

    pub fn secondary(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.providers = self.providers.with_secondary(client);
        self
    }

    pub fn selector(mut self, selector: BackendSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    /// Use a private document store instead of the process-wide one.
    pub fn documents(mut self, documents: DocumentStore) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn build(self) -> Harness {
        Harness {
            providers: self.providers,
            selector: self.selector,
            tools: self.tools,
            retriever: self.retriever,
            documents: self.documents.unwrap_or_else(DocumentStore::global),
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) async fn complete(
    client: &dyn ProviderClient,
    model: &str,
    request: &CompletionRequest,
) -> Result<String, ExecutionError> {
    client
        .complete(model, request)
        .await
        .map_err(|source| ExecutionError::ProviderCall {
            provider: client.name().to_string(),
            source,
        })
}

/// First `n` characters of `text`.
pub(crate) fn prefix_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedProvider;
    use super::*;
    use crate::error::ProviderError;
    use serde_json::json;
    use taskeval_types::{ClassificationInput, TaskKind};

    fn classification(text: &str) -> TaskInput {
        TaskInput::Classification(ClassificationInput {
            text: text.to_string(),
            labels: None,
        })
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_configuration_error() {
        let harness = Harness::builder().documents(DocumentStore::new()).build();
        let err = harness
            .execute(&classification("hi"), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Configuration { ref provider } if provider == "OpenAI"));
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let harness = Harness::builder()
            .secondary(provider)
            .documents(DocumentStore::new())
            .build();
        let err = harness
            .execute(&classification("hi"), "claude-3-haiku")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ProviderCall { .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_unknown_model_runs_offline() {
        let harness = Harness::builder().documents(DocumentStore::new()).build();
        for kind in TaskKind::ALL {
            let input = match kind {
                TaskKind::Classification => classification("great"),
                other => TaskInput::from_value(
                    other,
                    match other {
                        TaskKind::Correction => json!({"text": "teh cat"}),
                        TaskKind::Dialogue => json!({"message": "hello"}),
                        TaskKind::Rag => json!({"query": "rust", "documents": ["rust book"]}),
                        _ => json!({"task": "add numbers", "tools": ["calculator"]}),
                    },
                )
                .unwrap(),
            };
            let output = harness.execute(&input, "local-mock").await.unwrap();
            assert_eq!(output.kind(), kind);
            assert!((0.0..=1.0).contains(&output.confidence()));
        }
    }

    #[tokio::test]
    async fn test_fallback_is_reproducible() {
        let harness = Harness::builder().documents(DocumentStore::new()).build();
        let input = classification("这个产品真的很棒");
        let a = harness.execute(&input, "mock-a").await.unwrap();
        let b = harness.execute(&input, "mock-a").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_search_documents_by_collection() {
        let store = DocumentStore::new();
        store.add_documents("faq", ["how to install rust", "pricing plans"]);
        store.add_documents("blog", ["rust release notes"]);
        let harness = Harness::builder().documents(store).build();
        let passages = harness.search_documents("install rust", Some("faq"), 5).await;
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].content, "how to install rust");
        assert_eq!(harness.search_documents("rust", None, 1).await.len(), 1);
    }
}
