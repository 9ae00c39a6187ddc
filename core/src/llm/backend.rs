use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One stateless generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system_instruction: String,
    /// JSON schema the reply must conform to; `None` asks for free-form JSON
    pub response_schema: Option<Value>,
    pub contents: String,
}

/// Failure reported by the model collaborator
///
/// `status` carries the HTTP status code when the backend produced one;
/// transport failures and unparseable responses have none.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ModelError {
    pub status: Option<u16>,
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// The generative model seam
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate raw reply text (expected to be JSON) for the request
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ModelError>;
}
