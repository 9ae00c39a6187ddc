//! LLM module: model seam, HTTP client, structured replies, and rate-limit policy
//!
//! This module provides:
//! - `ModelBackend`, `GenerateRequest`, `ModelError`: the seam the session talks through
//! - `LlmClientConfig`, `LlmClient` for talking to OpenAI-compatible backends
//! - `request_to_messages` adapter for turning a `GenerateRequest` into chat messages
//! - `StructuredReply` and the primary response schema
//! - `RetryPolicy` for classifying failures into retry-after-delay or fatal

mod adapter;
mod backend;
mod client;
mod reply;
pub mod retry;

pub use adapter::{request_to_messages, response_format};
pub use backend::{GenerateRequest, ModelBackend, ModelError};
pub use client::{LlmClient, LlmClientConfig};
pub use reply::{primary_response_schema, StructuredReply};
pub use retry::{RetryDecision, RetryPolicy, SystemWindowClock, WindowClock};
