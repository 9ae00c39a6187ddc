//! Conversation Context
//!
//! This module holds everything a session needs to keep a conversation inside
//! the model's context window.
//!
//! # Architecture
//!
//! - **Turn**: One exchange unit (speaker + text)
//! - **History**: Ordered log of turns with shrink-to-fit
//! - **Window**: Token counting and the token budget

pub mod history;
pub mod window;

pub use history::HistoryStore;
pub use window::{CountError, EstimateCounter, TiktokenCounter, TokenBudget, TokenCounter};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Model,
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "User"),
            Speaker::Model => write!(f, "Model"),
            Speaker::System => write!(f, "System"),
        }
    }
}

/// A single entry in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Speaker::Model, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, text)
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}
