use std::sync::Arc;

use crate::error::{FaqError, Result};
use crate::llm::completion::GenerativeAnswerer;
use crate::llm::embeddings::EmbeddingProvider;
use crate::models::{Answer, AnswerSource, SimilarityResult};
use crate::search::VectorIndex;

/// Returned in place of a generated answer when the generative provider fails.
pub const DEGRADED_ANSWER: &str =
    "An error occurred while fetching the answer from the generative model.";

/// Decides per question whether the FAQ corpus can answer it or the
/// generative model has to.
///
/// Holds only shared read-only handles; `resolve` never writes to the store
/// or the index and is safe to call concurrently.
pub struct SimilarityRouter {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    answerer: Arc<dyn GenerativeAnswerer>,
    threshold: f32,
}

impl SimilarityRouter {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        answerer: Arc<dyn GenerativeAnswerer>,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            answerer,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Nearest FAQ entry for `question` and its similarity. An empty index
    /// yields no match with score 0.
    pub async fn find_most_similar(&self, question: &str) -> Result<SimilarityResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(FaqError::InvalidInput("question is empty".to_string()));
        }

        let query = self.embedder.embed(question).await?;
        let hit = self.index.search(&query, 1).await?.into_iter().next();

        Ok(match hit {
            Some(hit) => SimilarityResult {
                score: hit.similarity(),
                matched: Some(hit),
            },
            None => SimilarityResult {
                matched: None,
                score: 0.0,
            },
        })
    }

    /// Whether `score` is close enough to answer locally. Inclusive.
    pub fn is_similar(&self, score: f32) -> bool {
        score >= self.threshold
    }

    /// Answer `question` from the FAQ when a close match exists, otherwise
    /// from the generative model.
    pub async fn resolve(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        let result = self.find_most_similar(question).await?;
        tracing::debug!("Question: {question}");

        match result.matched {
            Some(hit) if self.is_similar(result.score) => {
                tracing::info!(
                    "Answering from FAQ entry {} (similarity {:.4}, threshold {})",
                    hit.id,
                    result.score,
                    self.threshold
                );
                Ok(Answer {
                    source: AnswerSource::Local,
                    matched_question: Some(hit.entry.question),
                    answer: hit.entry.answer,
                    similarity: Some(result.score),
                    degraded: false,
                })
            }
            matched => {
                let similarity = matched.as_ref().map(|_| result.score);
                tracing::info!(
                    "Escalating to generative model (similarity {:?}, threshold {})",
                    similarity,
                    self.threshold
                );
                let (answer, degraded) = match self.answerer.answer(question).await {
                    Ok(answer) => (answer, false),
                    Err(e) => {
                        tracing::error!("Generative answer failed: {e}");
                        (DEGRADED_ANSWER.to_string(), true)
                    }
                };
                Ok(Answer {
                    source: AnswerSource::Generative,
                    matched_question: None,
                    answer,
                    similarity,
                    degraded,
                })
            }
        }
    }
}
