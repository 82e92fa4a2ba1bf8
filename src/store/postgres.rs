use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::error::{FaqError, Result};
use crate::models::{Embedding, FaqEntry, FaqId, FaqRecord};
use crate::store::{normalize_entry, FaqStore};

const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    "CREATE TABLE IF NOT EXISTS faqs (
        id BIGSERIAL PRIMARY KEY,
        question TEXT NOT NULL UNIQUE,
        answer TEXT NOT NULL,
        embedding vector,
        embedding_model TEXT
    )",
];

/// FAQ store backed by a PostgreSQL table with a pgvector embedding column.
#[derive(Clone)]
pub struct PgFaqStore {
    pool: PgPool,
}

impl PgFaqStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        tracing::info!("Connected to PostgreSQL FAQ store");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the pgvector extension and the `faqs` table if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn not_found(id: FaqId) -> FaqError {
    FaqError::Store(format!("no FAQ entry with id {id}"))
}

#[async_trait]
impl FaqStore for PgFaqStore {
    async fn list_all(&self) -> Result<Vec<FaqRecord>> {
        let rows = sqlx::query(
            "SELECT id, question, answer, embedding, embedding_model FROM faqs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<FaqRecord> {
                let embedding: Option<Vector> = row.try_get("embedding")?;
                let model: Option<String> = row.try_get("embedding_model")?;
                Ok(FaqRecord {
                    id: FaqId(row.try_get("id")?),
                    question: row.try_get("question")?,
                    answer: row.try_get("answer")?,
                    embedding: match (embedding, model) {
                        (Some(vector), Some(model)) => Some(Embedding {
                            model,
                            vector: vector.to_vec(),
                        }),
                        _ => None,
                    },
                })
            })
            .collect()
    }

    async fn insert_if_absent(&self, entry: FaqEntry) -> Result<bool> {
        let entry = normalize_entry(entry)?;
        let result = sqlx::query(
            "INSERT INTO faqs (question, answer) VALUES ($1, $2) ON CONFLICT (question) DO NOTHING",
        )
        .bind(&entry.question)
        .bind(&entry.answer)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_embedding(&self, id: FaqId, embedding: &Embedding) -> Result<()> {
        let result = sqlx::query("UPDATE faqs SET embedding = $1, embedding_model = $2 WHERE id = $3")
            .bind(Vector::from(embedding.vector.clone()))
            .bind(&embedding.model)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn replace_embeddings(&self, embeddings: Vec<(FaqId, Embedding)>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE faqs SET embedding = NULL, embedding_model = NULL")
            .execute(&mut *tx)
            .await?;

        for (id, embedding) in &embeddings {
            let result =
                sqlx::query("UPDATE faqs SET embedding = $1, embedding_model = $2 WHERE id = $3")
                    .bind(Vector::from(embedding.vector.clone()))
                    .bind(&embedding.model)
                    .bind(id.0)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                // Dropping `tx` rolls everything back.
                return Err(not_found(*id));
            }
        }

        tx.commit().await?;
        tracing::info!("Replaced embeddings for {} FAQ entries", embeddings.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs only against a disposable database named by
    /// `FAQ_ROUTER_TEST_DATABASE_URL`.
    async fn test_store() -> Option<PgFaqStore> {
        let url = std::env::var("FAQ_ROUTER_TEST_DATABASE_URL").ok()?;
        let store = PgFaqStore::connect(&url).await.unwrap();
        sqlx::query("TRUNCATE faqs RESTART IDENTITY")
            .execute(store.pool())
            .await
            .unwrap();
        Some(store)
    }

    #[tokio::test]
    async fn test_pg_insert_if_absent_and_embeddings() {
        let Some(store) = test_store().await else {
            return;
        };

        assert!(store
            .insert_if_absent(FaqEntry::new("How do I reset my password?", "Click forgot password."))
            .await
            .unwrap());
        assert!(!store
            .insert_if_absent(FaqEntry::new("How do I reset my password?", "Other answer"))
            .await
            .unwrap());

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        let id = records[0].id;

        let embedding = Embedding {
            model: "m".to_string(),
            vector: vec![1.0, 0.0, 0.0],
        };
        store.upsert_embedding(id, &embedding).await.unwrap();
        let records = store.list_all().await.unwrap();
        assert_eq!(records[0].embedding.as_ref(), Some(&embedding));

        let err = store
            .replace_embeddings(vec![(FaqId(999), embedding.clone())])
            .await
            .unwrap_err();
        assert!(matches!(err, FaqError::Store(_)));
        let records = store.list_all().await.unwrap();
        assert!(records[0].embedding.is_some(), "failed replace must roll back");
    }
}
