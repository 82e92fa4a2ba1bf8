use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{FaqError, ProviderError, Result};
use crate::llm::retry::{with_retry, RetryPolicy};

/// Single-turn answer generation, used when no FAQ entry is close enough.
#[async_trait]
pub trait GenerativeAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String>;
}

/// Chat-completion client for Ollama or any OpenAI-compatible API.
/// Every call is a fresh conversation holding only the user's question.
pub struct ChatAnswerer {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl ChatAnswerer {
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
}

#[async_trait]
impl GenerativeAnswerer for ChatAnswerer {
    async fn answer(&self, question: &str) -> Result<String> {
        tracing::debug!("Sending question to {} ({})", self.config.provider, self.config.chat_model);

        let response = match self.config.provider.as_str() {
            "ollama" => {
                with_retry(&self.retry, "Ollama chat", || {
                    call_ollama(&self.client, &self.config, question)
                })
                .await
            }
            "openai" => {
                with_retry(&self.retry, "OpenAI chat", || {
                    call_openai(&self.client, &self.config, question)
                })
                .await
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
        .map_err(FaqError::GenerativeProvider)?;

        let answer = response.trim().to_string();
        if answer.is_empty() {
            return Err(FaqError::GenerativeProvider(ProviderError::InvalidResponse(
                "empty completion".to_string(),
            )));
        }
        Ok(answer)
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn user_message(question: &str) -> Vec<Message> {
    vec![Message {
        role: "user".to_string(),
        content: question.to_string(),
    }]
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    question: &str,
) -> std::result::Result<String, ProviderError> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaChatRequest {
        model: &config.chat_model,
        messages: user_message(question),
        stream: false,
        options: OllamaOptions {
            temperature: config.temperature,
        },
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

    let body: OllamaChatResponse = resp.json().await?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    question: &str,
) -> std::result::Result<String, ProviderError> {
    let url = format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: &config.chat_model,
        messages: user_message(question),
        temperature: config.temperature,
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

    let body: OpenAiChatResponse = resp.json().await?;
    first_choice_content(body)
}

fn first_choice_content(body: OpenAiChatResponse) -> std::result::Result<String, ProviderError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("completion has no content".to_string()))
}
