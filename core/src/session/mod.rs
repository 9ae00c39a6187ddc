//! Chat sessions.
//!
//! A `SessionEngine` runs one turn at a time: `handle_turn` takes `&mut self`,
//! so turns on a session are serialized by the borrow checker. Callers that
//! share a session between tasks wrap it in a `tokio::sync::Mutex`.

pub mod config;
mod engine;
pub mod prompts;

pub use config::SessionConfig;
pub use engine::{SessionEngine, SessionState};
