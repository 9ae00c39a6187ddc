// QueryChat Core Library
// Token-budgeted chat sessions that turn questions into SQL and ground answers in query output

pub mod context;
pub mod llm;
pub mod session;
pub mod sql;

// Export core types
pub use context::{HistoryStore, Speaker, Turn};
pub use context::window::{TokenBudget, TokenCounter};
pub use llm::{GenerateRequest, ModelBackend, ModelError, RetryDecision, RetryPolicy, StructuredReply};
pub use session::{SessionConfig, SessionEngine, SessionState};
pub use sql::{Database, QueryExecutor, QueryOutcome, QueryResult, SqlValue};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryChatError {
    #[error("Input window is full ({tokens} tokens, limit {limit}), please enter a shorter text")]
    InputTooLong { tokens: usize, limit: usize },

    #[error("Context window cannot fit the prompt even after clearing the history")]
    ContextExhausted,

    #[error("Malformed model reply: {0}")]
    MalformedReply(String),

    #[error("Model API error: {0}")]
    Api(#[from] ModelError),

    #[error("Rate limited after {attempts} attempts: {source}")]
    RateLimited { attempts: u32, source: ModelError },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, QueryChatError>;
