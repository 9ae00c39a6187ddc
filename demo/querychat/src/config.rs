use std::fs;
use std::path::{Path, PathBuf};

use querychat_core::llm::LlmClientConfig;
use querychat_core::SessionConfig;

/// High-level configuration for the QueryChat demo
#[derive(Clone, Debug)]
pub struct QueryChatConfig {
    /// SQLite path or `file:` URI
    pub database: String,
    /// SQL script whose `CREATE` statements describe the database
    pub schema_script: PathBuf,
    /// `tiktoken` or `estimate`
    pub token_counter: String,
    pub llm: LlmClientConfig,
    pub session: SessionConfig,
}

impl Default for QueryChatConfig {
    fn default() -> Self {
        Self {
            database: std::env::var("QUERYCHAT_DATABASE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "file:database/Northwind.db?mode=ro".to_string()),
            schema_script: std::env::var("QUERYCHAT_SCHEMA")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("database/database_script.sql")),
            token_counter: std::env::var("QUERYCHAT_TOKEN_COUNTER")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "tiktoken".to_string()),
            llm: LlmClientConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl QueryChatConfig {
    /// Load configuration from a TOML file (path via QUERYCHAT_CONFIG or ./querychat.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("QUERYCHAT_CONFIG").unwrap_or_else(|_| "querychat.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target: "querychat", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<QueryChatToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "querychat", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "querychat", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct QueryChatToml {
    pub database: Option<String>,
    pub schema_script: Option<PathBuf>,
    pub token_counter: Option<String>,
    pub llm: Option<LlmToml>,
    /// Missing keys keep their defaults
    pub session: Option<SessionConfig>,
}

impl QueryChatToml {
    fn overlay(self, mut base: QueryChatConfig) -> QueryChatConfig {
        if let Some(x) = self.database {
            base.database = x;
        }
        if let Some(x) = self.schema_script {
            base.schema_script = x;
        }
        if let Some(x) = self.token_counter {
            base.token_counter = x;
        }
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        if let Some(s) = self.session {
            base.session = s;
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub input_token_limit: Option<usize>,
    pub output_token_limit: Option<usize>,
}

impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(x) = self.base_url {
            l.base_url = x;
        }
        if let Some(x) = self.model {
            l.model = x;
        }
        if let Some(x) = self.api_key {
            l.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            l.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            l.temperature = x;
        }
        if let Some(x) = self.input_token_limit {
            l.input_token_limit = x;
        }
        if let Some(x) = self.output_token_limit {
            l.output_token_limit = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "QUERYCHAT_DATABASE",
            "QUERYCHAT_SCHEMA",
            "QUERYCHAT_TOKEN_COUNTER",
            "LLM_MODEL",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn missing_file_uses_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let cfg = QueryChatConfig::load_from(&dir.path().join("absent.toml"));

        assert_eq!(cfg.database, "file:database/Northwind.db?mode=ro");
        assert_eq!(cfg.schema_script, PathBuf::from("database/database_script.sql"));
        assert_eq!(cfg.token_counter, "tiktoken");
        assert_eq!(cfg.llm.model, "gemini-2.0-flash-lite");
        assert!(!cfg.session.debug);
    }

    #[test]
    #[serial]
    fn toml_overlays_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querychat.toml");
        fs::write(
            &path,
            r#"
database = "shop.db"
token_counter = "estimate"

[llm]
model = "gemini-1.5-flash"
output_token_limit = 2048

[session]
debug = true
certainty_threshold = 0.9
"#,
        )
        .unwrap();

        let cfg = QueryChatConfig::load_from(&path);

        assert_eq!(cfg.database, "shop.db");
        assert_eq!(cfg.token_counter, "estimate");
        assert_eq!(cfg.llm.model, "gemini-1.5-flash");
        assert_eq!(cfg.llm.output_token_limit, 2048);
        assert_eq!(cfg.llm.input_token_limit, 1_048_576);
        assert!(cfg.session.debug);
        assert_eq!(cfg.session.certainty_threshold, 0.9);
        assert_eq!(cfg.session.max_query_attempts, 3);
    }

    #[test]
    #[serial]
    fn invalid_toml_falls_back_to_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querychat.toml");
        fs::write(&path, "database = [").unwrap();

        let cfg = QueryChatConfig::load_from(&path);
        assert_eq!(cfg.token_counter, "tiktoken");
    }
}
