use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use crate::context::window::ModelLimits;
use crate::{QueryChatError, Result};

use super::adapter::{request_to_messages, response_format};
use super::backend::{GenerateRequest, ModelBackend, ModelError};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., https://generativelanguage.googleapis.com/v1beta/openai
    pub model: String,    // e.g., gemini-2.0-flash-lite
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub input_token_limit: usize,
    pub output_token_limit: usize,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        let limits = ModelLimits::default();
        Self {
            base_url: std::env::var("LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| {
                    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
                }),
            model: std::env::var("LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gemini-2.0-flash-lite".to_string()),
            api_key: std::env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(1.0),
            input_token_limit: std::env::var("LLM_INPUT_TOKEN_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(limits.input_token_limit),
            output_token_limit: std::env::var("LLM_OUTPUT_TOKEN_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(limits.output_token_limit),
        }
    }
}

impl LlmClientConfig {
    pub fn limits(&self) -> ModelLimits {
        ModelLimits {
            input_token_limit: self.input_token_limit,
            output_token_limit: self.output_token_limit,
        }
    }
}

/// HTTP client for OpenAI-compatible Chat Completions with JSON-constrained output
#[derive(Clone)]
pub struct LlmClient {
    pub(crate) http: Client,
    pub(crate) cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| QueryChatError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }
}

#[async_trait]
impl ModelBackend for LlmClient {
    /// Contract:
    /// - Input: system instruction, optional response schema, contents
    /// - Output: assistant text (JSON when the backend honors `response_format`)
    /// - Error: HTTP failures carry their status code; transport/parse failures carry none
    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<String, ModelError> {
        let chat_url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(target: "llm_client", "POST {} via Chat Completions", chat_url);

        let mut req = self
            .http
            .post(&chat_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.model,
            "messages": request_to_messages(request),
            "max_tokens": u32::try_from(self.cfg.output_token_limit).unwrap_or(u32::MAX),
            "temperature": self.cfg.temperature,
            "response_format": response_format(request),
        });

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::new(format!("Chat Completions HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(ModelError::with_status(
                status.as_u16(),
                format!("Chat Completions error: status={} body={}", status, text),
            ));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            ModelError::new(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        if let Some(usage) = val.get("usage") {
            debug!(target: "llm_client", %usage, "Chat Completions usage");
        }
        extract_text_from_chat_completions(&val).ok_or_else(|| {
            ModelError::new("Missing choices[0].message.content in chat completions")
        })
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "{\"a\":1}"}}]});
        assert_eq!(
            extract_text_from_chat_completions(&v).as_deref(),
            Some("{\"a\":1}")
        );
        assert!(extract_text_from_chat_completions(&json!({"choices": []})).is_none());
    }
}
