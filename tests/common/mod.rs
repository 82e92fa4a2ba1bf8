//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use faq_router::config::Config;
use faq_router::error::{FaqError, ProviderError, Result};
use faq_router::llm::completion::GenerativeAnswerer;
use faq_router::llm::embeddings::{validate_texts, EmbeddingProvider};
use faq_router::models::FaqEntry;
use faq_router::search::vector::SnapshotIndex;
use faq_router::state::AppState;
use faq_router::store::json::JsonFaqStore;

pub const DIMENSION: usize = 128;

/// Bag-of-words embedder: every distinct lowercased word gets its own
/// dimension, so cosine similarity is exactly the normalized word overlap.
pub struct VocabularyEmbedder {
    model: String,
    vocabulary: Mutex<HashMap<String, usize>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn new() -> Self {
        Self::with_model("vocab-v1")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            vocabulary: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Make every following call fail with a provider error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock();
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
        {
            let next = vocabulary.len();
            let slot = *vocabulary.entry(word).or_insert(next);
            assert!(slot < DIMENSION, "test vocabulary exceeded {DIMENSION} words");
            vector[slot] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FaqError::EmbeddingProvider(ProviderError::InvalidResponse(
                "embedding service unavailable".to_string(),
            )));
        }
        validate_texts(texts)?;
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Answers every question with a recognizable generated string.
#[derive(Default)]
pub struct EchoAnswerer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GenerativeAnswerer for EchoAnswerer {
    async fn answer(&self, question: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("generated: {question}"))
    }
}

pub struct FailingAnswerer;

#[async_trait]
impl GenerativeAnswerer for FailingAnswerer {
    async fn answer(&self, _question: &str) -> Result<String> {
        Err(FaqError::GenerativeProvider(ProviderError::InvalidResponse(
            "completion service unavailable".to_string(),
        )))
    }
}

pub fn sample_faqs() -> Vec<FaqEntry> {
    vec![
        FaqEntry::new("How do I reset my password?", "Click forgot password."),
        FaqEntry::new(
            "Where can I see my invoices?",
            "Invoices are listed under Billing.",
        ),
        FaqEntry::new(
            "How long does shipping take?",
            "Orders arrive within five business days.",
        ),
    ]
}

pub fn test_config(dir: &Path, threshold: f32) -> Config {
    let mut config = Config::default();
    config.data_dir = dir.to_path_buf();
    config.similarity_threshold = threshold;
    config.llm.api_key = Some("test-key".to_string());
    config
}

/// JSON store plus snapshot index under `dir`, wired to the given fakes.
pub fn snapshot_state(
    config: Config,
    embedder: Arc<VocabularyEmbedder>,
    answerer: Arc<dyn GenerativeAnswerer>,
) -> AppState {
    let store = Arc::new(JsonFaqStore::open_or_create(&config.store_path()).unwrap());
    let snapshot = Arc::new(SnapshotIndex::new(
        &config.snapshot_path(),
        embedder.model_name(),
    ));
    AppState::from_parts(
        config,
        store,
        snapshot.clone(),
        Some(snapshot),
        embedder,
        answerer,
    )
}
