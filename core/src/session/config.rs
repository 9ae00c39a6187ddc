//! Configuration for chat sessions.

use serde::{Deserialize, Serialize};

use crate::llm::retry::DEFAULT_WINDOW_SECS;
use crate::sql::DEFAULT_MAX_ATTEMPTS;

/// Configuration for a session engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum reported certainty before generated SQL is executed
    pub certainty_threshold: f64,

    /// Fraction of the context window that triggers the near-full warning
    pub near_limit_ratio: f64,

    /// Total executions allowed per turn, counting model-corrected statements
    pub max_query_attempts: u32,

    /// Rate-limit retries per model call before the turn is aborted
    pub max_rate_limit_retries: u32,

    /// Length of the quota window in seconds
    pub rate_limit_window_secs: u64,

    /// Prefix replies with the raw model output
    pub debug: bool,

    /// Explicit context ceiling; derived as input + output when unset
    pub context_limit: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            certainty_threshold: 0.8,
            near_limit_ratio: 0.8,
            max_query_attempts: DEFAULT_MAX_ATTEMPTS,
            max_rate_limit_retries: 3,
            rate_limit_window_secs: DEFAULT_WINDOW_SECS,
            debug: false,
            context_limit: None,
        }
    }
}
