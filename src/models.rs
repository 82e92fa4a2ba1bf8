use serde::{Deserialize, Serialize};

/// Surrogate key of a stored FAQ entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaqId(pub i64);

impl std::fmt::Display for FaqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A question and its canonical answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A vector tagged with the model that produced it. Vectors from different
/// models are never compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub model: String,
    pub vector: Vec<f32>,
}

/// A FAQ entry as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub id: FaqId,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

impl FaqRecord {
    pub fn entry(&self) -> FaqEntry {
        FaqEntry::new(self.question.clone(), self.answer.clone())
    }

    /// The stored vector, if it was produced by `model`.
    pub fn embedding_for(&self, model: &str) -> Option<&[f32]> {
        self.embedding
            .as_ref()
            .filter(|e| e.model == model)
            .map(|e| e.vector.as_slice())
    }
}

/// One entry handed to a vector index: identity, payload and vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: FaqId,
    pub entry: FaqEntry,
    pub vector: Vec<f32>,
}

/// A nearest-neighbor match. `distance` is a cosine distance in `[0, 2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: FaqId,
    pub entry: FaqEntry,
    pub distance: f32,
}

impl IndexHit {
    pub fn similarity(&self) -> f32 {
        similarity_from_distance(self.distance)
    }
}

/// Cosine similarity from cosine distance. Only valid for a true cosine
/// distance; both index backends guarantee one.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance
}

/// Best match for a query, before routing.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub matched: Option<IndexHit>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Answered from the FAQ corpus
    Local,
    /// Answered by the generative model
    Generative,
}

/// Result of resolving one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub source: AnswerSource,
    pub matched_question: Option<String>,
    pub answer: String,
    /// Similarity of the best FAQ match, if there was one
    pub similarity: Option<f32>,
    /// The generative call failed and `answer` is a fallback message
    pub degraded: bool,
}

/// Ask-question request
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub user_question: String,
}

/// Ask-question response
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub source: AnswerSource,
    pub matched_question: Option<String>,
    pub answer: String,
    pub similarity_score: Option<f32>,
    pub degraded: bool,
}

impl AskResponse {
    pub fn new(question: String, answer: Answer) -> Self {
        Self {
            question,
            source: answer.source,
            matched_question: answer.matched_question,
            answer: answer.answer,
            similarity_score: answer.similarity,
            degraded: answer.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_source_serializes_to_snake_case() {
        assert_eq!(serde_json::to_value(AnswerSource::Local).unwrap(), "local");
        assert_eq!(
            serde_json::to_value(AnswerSource::Generative).unwrap(),
            "generative"
        );
    }

    #[test]
    fn test_embedding_for_ignores_other_models() {
        let record = FaqRecord {
            id: FaqId(1),
            question: "q".to_string(),
            answer: "a".to_string(),
            embedding: Some(Embedding {
                model: "text-embedding-ada-002".to_string(),
                vector: vec![1.0],
            }),
        };
        assert!(record.embedding_for("text-embedding-3-small").is_none());
        assert_eq!(record.embedding_for("text-embedding-ada-002"), Some(&[1.0][..]));
    }

    #[test]
    fn test_similarity_is_one_minus_distance() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(0.25), 0.75);
        assert_eq!(similarity_from_distance(2.0), -1.0);
    }

    #[test]
    fn test_record_without_embedding_deserializes() {
        let json = r#"{"id":3,"question":"q","answer":"a"}"#;
        let record: FaqRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, FaqId(3));
        assert!(record.embedding.is_none());
    }

    #[test]
    fn test_missing_user_question_defaults_to_empty() {
        let req: AskRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user_question.is_empty());
    }
}
