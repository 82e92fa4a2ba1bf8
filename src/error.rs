use thiserror::Error;

/// Errors surfaced by the routing core, the indexes and the stores.
#[derive(Error, Debug)]
pub enum FaqError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(#[source] ProviderError),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generative provider error: {0}")]
    GenerativeProvider(#[source] ProviderError),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("FAQ store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, FaqError>;

/// Failure talking to an external model provider (embeddings or chat).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Timeouts, connection failures, rate limiting and 5xx responses are
    /// worth another attempt; auth failures and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Status { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            ProviderError::InvalidResponse(_) | ProviderError::UnknownProvider(_) => false,
        }
    }
}
