//! Token Counting
//!
//! Provides token counting for context window management.

use std::sync::Arc;

use thiserror::Error;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Counting collaborator failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountError {
    #[error("Token counting unavailable: {0}")]
    Unavailable(String),
}

/// Token counting interface for different LLM models
pub trait TokenCounter: Send + Sync {
    /// Count tokens in text
    fn count_text(&self, text: &str) -> Result<usize, CountError>;
}

/// BPE counter backed by the `cl100k_base` vocabulary
///
/// The vocabulary is loaded once at construction. If loading fails the
/// counter stays usable but every call reports `CountError::Unavailable`.
pub struct TiktokenCounter {
    bpe: Result<CoreBPE, String>,
}

impl TiktokenCounter {
    pub fn new() -> Self {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| e.to_string());
        if let Err(e) = &bpe {
            warn!(target: "token_counter", error = %e, "Failed to load cl100k_base vocabulary");
        }
        Self { bpe }
    }
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_text(&self, text: &str) -> Result<usize, CountError> {
        match &self.bpe {
            Ok(bpe) => Ok(bpe.encode_with_special_tokens(text).len()),
            Err(e) => Err(CountError::Unavailable(e.clone())),
        }
    }
}

/// Character-based estimation:
/// - Average 4 characters per token (common for English)
pub struct EstimateCounter {
    chars_per_token: f32,
}

impl EstimateCounter {
    pub fn new(chars_per_token: f32) -> Self {
        Self { chars_per_token }
    }
}

impl Default for EstimateCounter {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl TokenCounter for EstimateCounter {
    fn count_text(&self, text: &str) -> Result<usize, CountError> {
        if text.is_empty() {
            return Ok(0);
        }
        // Add 10% buffer for special tokens
        let base_estimate = (text.chars().count() as f32 / self.chars_per_token).ceil() as usize;
        Ok(base_estimate + (base_estimate / 10))
    }
}

/// Create a shared token counter by name ("tiktoken" or "estimate")
pub fn create_counter(kind: &str) -> Arc<dyn TokenCounter> {
    match kind {
        "estimate" => Arc::new(EstimateCounter::default()),
        _ => Arc::new(TiktokenCounter::new()),
    }
}
