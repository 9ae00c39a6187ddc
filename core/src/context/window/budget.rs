//! Token Budget
//!
//! Tracks the input/output/context ceilings of one session and measures the
//! token cost of history and prompts against them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::history::HistoryStore;
use crate::context::window::token_counter::TokenCounter;

/// Token ceilings advertised by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimits {
    pub input_token_limit: usize,
    pub output_token_limit: usize,
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self {
            input_token_limit: 1_048_576,
            output_token_limit: 8_192,
        }
    }
}

/// Budget for one session's context window
///
/// `input_limit` is reduced once, at construction, by the cost of the fixed
/// preamble (system instruction + response schema) and is never changed again.
#[derive(Clone)]
pub struct TokenBudget {
    counter: Arc<dyn TokenCounter>,
    input_limit: usize,
    output_limit: usize,
    context_limit: usize,
    near_limit_ratio: f64,
}

impl TokenBudget {
    pub fn new(counter: Arc<dyn TokenCounter>, limits: ModelLimits, preamble: &str) -> Self {
        let mut budget = Self {
            counter,
            input_limit: limits.input_token_limit,
            output_limit: limits.output_token_limit,
            context_limit: 0,
            near_limit_ratio: 0.8,
        };
        budget.input_limit = limits
            .input_token_limit
            .saturating_sub(budget.cost(preamble));
        budget.context_limit = budget.input_limit + budget.output_limit;
        budget
    }

    /// Override the derived `input + output` context ceiling
    pub fn with_context_limit(mut self, context_limit: usize) -> Self {
        self.context_limit = context_limit;
        self
    }

    pub fn with_near_limit_ratio(mut self, ratio: f64) -> Self {
        self.near_limit_ratio = ratio;
        self
    }

    pub fn input_limit(&self) -> usize {
        self.input_limit
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    /// Token cost of `text`; 0 when the counting collaborator fails.
    pub fn cost(&self, text: &str) -> usize {
        match self.counter.count_text(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(target: "token_budget", error = %e, chars = text.len(), "Token counting unavailable; assuming 0 tokens");
                0
            }
        }
    }

    /// Tokens one exchange would occupy: history + prompt + reserved output
    pub fn used(&self, history: &HistoryStore, prompt: &str) -> usize {
        self.cost(&history.serialize()) + self.cost(prompt) + self.output_limit
    }

    pub fn remaining(&self, history: &HistoryStore, prompt: &str) -> i64 {
        self.context_limit as i64 - self.used(history, prompt) as i64
    }

    pub fn is_over_limit(&self, history: &HistoryStore, prompt: &str) -> bool {
        self.remaining(history, prompt) <= 0
    }

    pub fn is_near_limit(&self, history: &HistoryStore, prompt: &str) -> bool {
        self.used(history, prompt) as f64 >= self.near_limit_ratio * self.context_limit as f64
    }
}

impl fmt::Debug for TokenBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBudget")
            .field("input_limit", &self.input_limit)
            .field("output_limit", &self.output_limit)
            .field("context_limit", &self.context_limit)
            .field("near_limit_ratio", &self.near_limit_ratio)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::window::token_counter::CountError;
    use crate::context::Turn;

    /// One token per whitespace-separated word
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count_text(&self, text: &str) -> Result<usize, CountError> {
            Ok(text.split_whitespace().count())
        }
    }

    struct BrokenCounter;

    impl TokenCounter for BrokenCounter {
        fn count_text(&self, _text: &str) -> Result<usize, CountError> {
            Err(CountError::Unavailable("service down".into()))
        }
    }

    fn limits(input: usize, output: usize) -> ModelLimits {
        ModelLimits {
            input_token_limit: input,
            output_token_limit: output,
        }
    }

    #[test]
    fn test_preamble_reduces_input_limit() {
        let budget = TokenBudget::new(Arc::new(WordCounter), limits(100, 20), "one two three four");

        assert_eq!(budget.input_limit(), 96);
        assert_eq!(budget.output_limit(), 20);
        assert_eq!(budget.context_limit(), 116);
    }

    #[test]
    fn test_external_context_limit() {
        let budget = TokenBudget::new(Arc::new(WordCounter), limits(100, 20), "")
            .with_context_limit(50);

        assert_eq!(budget.input_limit(), 100);
        assert_eq!(budget.context_limit(), 50);
    }

    #[test]
    fn test_cost_falls_back_to_zero() {
        let budget = TokenBudget::new(Arc::new(BrokenCounter), limits(100, 20), "a long preamble");

        assert_eq!(budget.cost("anything at all"), 0);
        // Preamble cost also fell back to zero
        assert_eq!(budget.input_limit(), 100);
    }

    #[test]
    fn test_remaining_and_limits() {
        let budget = TokenBudget::new(Arc::new(WordCounter), limits(10, 5), "");
        let mut history = HistoryStore::new();

        // context 15, output reserve 5, prompt 2 -> remaining 8
        assert_eq!(budget.remaining(&history, "hello there"), 8);
        assert!(!budget.is_over_limit(&history, "hello there"));
        assert!(!budget.is_near_limit(&history, "hello there"));

        // "User: a b c" + "Model: d e f" = 8 words -> used 15
        history.append(Turn::user("a b c"));
        history.append(Turn::model("d e f"));
        assert_eq!(budget.remaining(&history, "hello there"), 0);
        assert!(budget.is_over_limit(&history, "hello there"));
        assert!(budget.is_near_limit(&history, "hello there"));
    }

    #[test]
    fn test_near_limit_threshold() {
        let budget = TokenBudget::new(Arc::new(WordCounter), limits(5, 5), "");
        let history = HistoryStore::new();

        // used = 3 + 5 = 8 >= 0.8 * 10
        assert!(budget.is_near_limit(&history, "one two three"));
        assert!(!budget.is_over_limit(&history, "one two three"));
        // used = 2 + 5 = 7 < 8
        assert!(!budget.is_near_limit(&history, "one two"));
    }
}
