use taskeval_types::TaskKind;
use thiserror::Error;

/// Invocation-level failure. A run that ends in one of these has no output
/// and must be recorded as failed by the caller.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{provider} API key not configured")]
    Configuration { provider: String },

    #[error("{provider} call failed: {source}")]
    ProviderCall {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Raised by a tool body; always absorbed into a failed execution record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("cannot score a {predicted} output against a {expected} expectation")]
    KindMismatch { predicted: TaskKind, expected: TaskKind },

    #[error("prediction count {predicted} does not match expectation count {expected}")]
    LengthMismatch { predicted: usize, expected: usize },
}
