use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;

use crate::error::{FaqError, Result};
use crate::models::{Embedding, FaqEntry, FaqId, IndexHit, IndexedEntry};
use crate::search::{check_k, VectorIndex};
use crate::store::postgres::PgFaqStore;
use crate::store::FaqStore;

const SEARCH_SQL: &str = "SELECT id, question, answer, (embedding <=> $1)::float8 AS distance
     FROM faqs
     WHERE embedding IS NOT NULL AND embedding_model = $2
     ORDER BY embedding <=> $1, id
     LIMIT $3";

/// Cosine search over the `faqs.embedding` column using pgvector's `<=>`.
///
/// Vectors live next to the FAQ rows, so building or upserting this index is
/// a write to the store. Only rows embedded with the configured model are
/// searched.
pub struct PgVectorIndex {
    store: PgFaqStore,
    model: String,
}

impl PgVectorIndex {
    pub fn new(store: PgFaqStore, model: &str) -> Self {
        Self {
            store,
            model: model.to_string(),
        }
    }

    fn embedding(&self, vector: Vec<f32>) -> Embedding {
        Embedding {
            model: self.model.clone(),
            vector,
        }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        check_k(k)?;
        let limit = i64::try_from(k).map_err(|_| FaqError::InvalidInput(format!("k too large: {k}")))?;

        let rows = sqlx::query(SEARCH_SQL)
            .bind(Vector::from(query.to_vec()))
            .bind(&self.model)
            .bind(limit)
            .fetch_all(self.store.pool())
            .await?;

        rows.into_iter()
            .map(|row| -> Result<IndexHit> {
                // NaN comes back for a zero query vector; treat it as orthogonal.
                let distance: f64 = row.try_get("distance")?;
                let distance = if distance.is_nan() { 1.0 } else { distance.clamp(0.0, 2.0) };
                Ok(IndexHit {
                    id: FaqId(row.try_get("id")?),
                    entry: FaqEntry::new(
                        row.try_get::<String, _>("question")?,
                        row.try_get::<String, _>("answer")?,
                    ),
                    distance: distance as f32,
                })
            })
            .collect()
    }

    async fn build(&self, entries: Vec<IndexedEntry>) -> Result<()> {
        let embeddings = entries
            .into_iter()
            .map(|e| (e.id, self.embedding(e.vector)))
            .collect();
        self.store.replace_embeddings(embeddings).await
    }

    async fn upsert(&self, entry: IndexedEntry) -> Result<()> {
        let embedding = self.embedding(entry.vector);
        self.store.upsert_embedding(entry.id, &embedding).await
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM faqs WHERE embedding IS NOT NULL AND embedding_model = $1",
        )
        .bind(&self.model)
        .fetch_one(self.store.pool())
        .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn is_store_resident(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
