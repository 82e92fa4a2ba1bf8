use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the JSON FAQ store and the index snapshot live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Bearer token required by `/ask-question`. Unset disables the check.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    /// Which vector index backend to use
    pub index_backend: IndexBackend,
    /// PostgreSQL URL for the `postgres` backend
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    /// Minimum similarity (inclusive) for answering from the FAQ
    pub similarity_threshold: f32,
    /// LLM provider configuration
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// In-process flat index persisted as a snapshot file
    Snapshot,
    /// pgvector column queried with the cosine distance operator
    Postgres,
}

impl IndexBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "snapshot" | "file" => Some(IndexBackend::Snapshot),
            "postgres" | "postgresql" | "pgvector" => Some(IndexBackend::Postgres),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexBackend::Snapshot => "snapshot",
            IndexBackend::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for generative answers
    pub chat_model: String,
    /// Model name for embeddings. Changing it invalidates stored embeddings.
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature for generative answers
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per provider call, including the first
    pub max_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8000".to_string(),
            api_token: None,
            index_backend: IndexBackend::Snapshot,
            database_url: None,
            similarity_threshold: 0.7,
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            temperature: 0.7,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("FAQ_ROUTER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("FAQ_ROUTER_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(token) =
            std::env::var("FAQ_ROUTER_API_TOKEN").or_else(|_| std::env::var("API_TOKEN"))
        {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }
        if let Ok(backend) = std::env::var("INDEX_BACKEND") {
            if let Some(b) = IndexBackend::parse(&backend) {
                config.index_backend = b;
            }
        }
        config.database_url = std::env::var("DATABASE_URL")
            .ok()
            .or_else(postgres_url_from_parts);
        if let Ok(val) = std::env::var("SIMILARITY_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.similarity_threshold = v;
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("EMBEDDINGS_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY").or_else(|_| std::env::var("LLM_API_KEY"))
        {
            config.llm.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_RETRIES") {
            if let Ok(v) = val.parse::<usize>() {
                config.llm.max_retries = v.max(1);
            }
        }

        config
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.similarity_threshold.is_finite() {
            anyhow::bail!(
                "SIMILARITY_THRESHOLD must be a finite number, got {}",
                self.similarity_threshold
            );
        }
        match self.llm.provider.as_str() {
            "openai" => {
                if self.llm.api_key.as_deref().unwrap_or_default().is_empty() {
                    anyhow::bail!("OPENAI_API_KEY is required for the openai provider");
                }
            }
            "ollama" => {}
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
        if self.llm.embedding_model.trim().is_empty() {
            anyhow::bail!("EMBEDDINGS_MODEL must not be empty");
        }
        if self.index_backend == IndexBackend::Postgres && self.database_url.is_none() {
            anyhow::bail!("The postgres index backend requires DATABASE_URL or POSTGRES_* settings");
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("faqs.json")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("index").join("faq_index.json")
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }
}

/// Assemble a URL from `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_HOST`,
/// `POSTGRES_PORT` and `POSTGRES_DB` when `DATABASE_URL` is absent.
fn postgres_url_from_parts() -> Option<String> {
    let user = std::env::var("POSTGRES_USER").ok()?;
    let db = std::env::var("POSTGRES_DB").ok()?;
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    Some(format!("postgres://{user}:{password}@{host}:{port}/{db}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.llm.embedding_model, "text-embedding-3-small");
        assert_eq!(config.llm.chat_model, "gpt-4o");
        assert_eq!(config.index_backend, IndexBackend::Snapshot);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_api_key_for_openai() {
        let mut config = valid();
        config.llm.api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_ollama_without_key() {
        let mut config = valid();
        config.llm.provider = "ollama".to_string();
        config.llm.api_key = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan_threshold() {
        let mut config = valid();
        config.similarity_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = valid();
        config.llm.provider = "anthropic-local".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_backend_needs_database_url() {
        let mut config = valid();
        config.index_backend = IndexBackend::Postgres;
        assert!(config.validate().is_err());
        config.database_url = Some("postgres://localhost/faqs".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(IndexBackend::parse("Snapshot"), Some(IndexBackend::Snapshot));
        assert_eq!(IndexBackend::parse("pgvector"), Some(IndexBackend::Postgres));
        assert_eq!(IndexBackend::parse("faiss"), None);
    }

    #[test]
    fn test_serialized_config_omits_secrets() {
        let mut config = valid();
        config.api_token = Some("token".to_string());
        config.database_url = Some("postgres://u:p@h/db".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-test"));
        assert!(!json.contains("api_token"));
        assert!(!json.contains("u:p@h"));
    }
}
