//! Durable FAQ storage: the source of truth for question/answer text and the
//! embeddings computed for it.

pub mod json;
pub mod postgres;

use async_trait::async_trait;

use crate::error::{FaqError, Result};
use crate::models::{Embedding, FaqEntry, FaqId, FaqRecord};

#[async_trait]
pub trait FaqStore: Send + Sync {
    /// Every stored entry, ordered by id.
    async fn list_all(&self) -> Result<Vec<FaqRecord>>;

    /// Insert `entry` unless an entry with exactly the same question exists.
    /// Returns whether a row was inserted.
    async fn insert_if_absent(&self, entry: FaqEntry) -> Result<bool>;

    /// Overwrite the embedding of one entry.
    async fn upsert_embedding(&self, id: FaqId, embedding: &Embedding) -> Result<()>;

    /// Replace all embeddings at once: listed entries get the given vector,
    /// every other entry loses its embedding. Either all of it applies or
    /// none of it does.
    async fn replace_embeddings(&self, embeddings: Vec<(FaqId, Embedding)>) -> Result<()>;
}

/// Trim both fields and reject blank ones.
pub fn normalize_entry(entry: FaqEntry) -> Result<FaqEntry> {
    let question = entry.question.trim();
    let answer = entry.answer.trim();
    if question.is_empty() {
        return Err(FaqError::InvalidInput("FAQ question is empty".to_string()));
    }
    if answer.is_empty() {
        return Err(FaqError::InvalidInput(format!(
            "FAQ answer is empty for question: {question}"
        )));
    }
    Ok(FaqEntry::new(question, answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_fields() {
        let entry = normalize_entry(FaqEntry::new("  Where is my order? ", "\tTrack it online.\n")).unwrap();
        assert_eq!(entry.question, "Where is my order?");
        assert_eq!(entry.answer, "Track it online.");
    }

    #[test]
    fn test_normalize_rejects_blank_question() {
        assert!(matches!(
            normalize_entry(FaqEntry::new(" ", "answer")),
            Err(FaqError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_blank_answer() {
        assert!(normalize_entry(FaqEntry::new("question?", "")).is_err());
    }
}
