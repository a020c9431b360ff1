//! taskeval-core: execute classification, correction, dialogue, RAG and
//! agent tasks against model backends, normalise their free-form output and
//! score it against stored expectations.
//!
//! Build a [`Harness`] (directly or from an [`EvalConfig`]), call
//! [`Harness::execute`] per task and [`score`] per result, or drive whole
//! suites through [`Eval`].

pub mod backend;
pub mod config;
pub mod datasource;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod provider;
pub mod retrieval;
pub mod runner;
pub mod scorer;
pub mod similarity;
pub mod tasks;
pub mod testing;
pub mod tools;
pub mod trace;

pub mod scorers {
    pub mod agent;
    pub mod classification;
    pub mod correction;
    pub mod dialogue;
    pub mod rag;
}

pub use backend::{Backend, BackendSelector, RouteRule};
pub use config::EvalConfig;
pub use datasource::{DataSource, JsonlDataSource, VecDataSource};
pub use error::{ExecutionError, ProviderError, ScoreError, ToolError};
pub use provider::{AnthropicClient, ChatMessage, CompletionRequest, OpenAiClient, ProviderClient, Providers, Role};
pub use retrieval::{DocumentStore, Embedder, HttpEmbedder, Retriever};
pub use runner::{Eval, EvalBuilder};
pub use scorer::{score, Scorer};
pub use scorers::{
    agent::AgentScorer,
    classification::{batch_evaluate, ClassificationScorer},
    correction::CorrectionScorer,
    dialogue::{dialogue_quality, DialogueQuality, DialogueScorer},
    rag::RagScorer,
};
pub use similarity::text_similarity;
pub use tasks::agent::{parse_tool_calls, AgentPhase};
pub use tasks::{Harness, HarnessBuilder};
pub use tools::{Tool, ToolRegistry};
pub use taskeval_types::*;
