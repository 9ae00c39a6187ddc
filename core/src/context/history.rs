//! Conversation history for a single session.

use std::collections::VecDeque;

use tracing::debug;

use super::window::TokenBudget;
use super::Turn;

/// Ordered, append-only log of turns
///
/// Turns are only ever removed from the front (shrinking) or the back
/// (rolling back an aborted turn).
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    turns: VecDeque<Turn>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
    }

    pub fn pop_last(&mut self) -> Option<Turn> {
        self.turns.pop_back()
    }

    pub fn all(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render as `Speaker: text` lines, the form sent to the model
    pub fn serialize(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop oldest turns until `prompt` fits the budget and no user/model pair
    /// is split. Returns the number of removed turns.
    pub fn shrink_to_fit(&mut self, prompt: &str, budget: &TokenBudget) -> usize {
        let mut removed = 0;
        while !self.turns.is_empty()
            && (budget.is_over_limit(self, prompt) || self.turns.len() % 2 == 1)
        {
            self.turns.pop_front();
            removed += 1;
        }
        debug!(target: "history", removed, remaining = self.turns.len(), "Shrunk chat history");
        removed
    }
}
