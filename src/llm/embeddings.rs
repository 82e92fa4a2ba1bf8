use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{FaqError, ProviderError, Result};
use crate::llm::retry::{with_retry, RetryPolicy};

/// Converts text into fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input order,
/// all produced by the model reported by [`EmbeddingProvider::model_name`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().ok_or_else(|| {
            FaqError::EmbeddingProvider(ProviderError::InvalidResponse(
                "no embedding returned".to_string(),
            ))
        })
    }

    /// Embed many texts, e.g. while building the index.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model producing the vectors.
    fn model_name(&self) -> &str;
}

/// Reject empty or whitespace-only input before it costs a provider call.
pub fn validate_texts(texts: &[String]) -> Result<()> {
    if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(FaqError::InvalidInput(format!(
            "text #{i} is empty; embeddings need non-empty input"
        )));
    }
    Ok(())
}

/// Embedding client for Ollama or any OpenAI-compatible API.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            client,
            config,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn embed_chunk(&self, chunk: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        match self.config.provider.as_str() {
            "ollama" => {
                with_retry(&self.retry, "Ollama embed", || {
                    embed_ollama(&self.client, &self.config, chunk)
                })
                .await
            }
            "openai" => {
                with_retry(&self.retry, "OpenAI embed", || {
                    embed_openai(&self.client, &self.config, chunk)
                })
                .await
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    fn batch_size(&self) -> usize {
        match self.config.provider.as_str() {
            "ollama" => 32,
            _ => 64,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        validate_texts(texts)?;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size()) {
            let embeddings = self
                .embed_chunk(chunk)
                .await
                .map_err(FaqError::EmbeddingProvider)?;
            if embeddings.len() != chunk.len() {
                return Err(FaqError::EmbeddingProvider(ProviderError::InvalidResponse(
                    format!(
                        "requested {} embeddings, provider returned {}",
                        chunk.len(),
                        embeddings.len()
                    ),
                )));
            }
            all_embeddings.extend(embeddings);
        }

        tracing::debug!(
            "Embedded {} texts with {}",
            all_embeddings.len(),
            self.config.embedding_model
        );
        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
    let url = format!("{}/api/embed", config.base_url.trim_end_matches('/'));

    let req = OllamaEmbedRequest {
        model: &config.embedding_model,
        input: texts,
        truncate: true,
    };

    let resp = client
        .post(&url)
        .timeout(config.timeout())
        .json(&req)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    let body: OllamaEmbedResponse = resp.json().await?;
    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
    let url = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiEmbedRequest {
        model: &config.embedding_model,
        input: texts,
    };

    let resp = client
        .post(&url)
        .timeout(config.timeout())
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    let body: OpenAiEmbedResponse = resp.json().await?;
    Ok(order_openai_embeddings(body.data))
}

/// OpenAI tags each embedding with the index of its input; honour it when
/// present instead of trusting response order.
fn order_openai_embeddings(mut data: Vec<OpenAiEmbedData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}
