//! Loading FAQ data into the store and keeping the vector index in sync
//! with it.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{FaqError, ProviderError, Result};
use crate::llm::embeddings::EmbeddingProvider;
use crate::models::{Embedding, FaqEntry, FaqRecord, IndexedEntry};
use crate::search::vector::{LoadOutcome, SnapshotIndex};
use crate::search::{normalize, VectorIndex};
use crate::store::FaqStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    /// Re-embed every entry
    Full,
    /// Embed only entries without an embedding from the current model
    Incremental,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: usize,
    /// Exact question already stored
    pub skipped: usize,
    /// Blank question or answer
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedReport {
    pub mode: EmbedMode,
    pub model: String,
    /// Entries sent to the embedding provider in this run
    pub embedded: usize,
    /// Entries searchable after the run
    pub indexed: usize,
}

/// Runs the load and embed steps against one store, index and embedder.
pub struct Indexer {
    store: Arc<dyn FaqStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn FaqStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// Load a JSON array of `{question, answer}` objects.
    pub async fn load_file(&self, path: &Path) -> Result<LoadReport> {
        let data = std::fs::read_to_string(path)?;
        let entries: Vec<FaqEntry> = serde_json::from_str(&data).map_err(|e| {
            FaqError::InvalidInput(format!("malformed FAQ file {}: {e}", path.display()))
        })?;
        tracing::info!("Read {} FAQ entries from {}", entries.len(), path.display());
        self.load_entries(entries).await
    }

    pub async fn load_entries(&self, entries: Vec<FaqEntry>) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for entry in entries {
            match self.store.insert_if_absent(entry).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.skipped += 1,
                Err(FaqError::InvalidInput(reason)) => {
                    tracing::warn!("Rejected FAQ entry: {reason}");
                    report.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "FAQ load: {} inserted, {} skipped, {} rejected",
            report.inserted,
            report.skipped,
            report.rejected
        );
        Ok(report)
    }

    /// Compute embeddings and write them to the index.
    ///
    /// Every vector of the run is computed before anything is written, so a
    /// provider failure leaves the store and the index untouched.
    pub async fn embed(&self, mode: EmbedMode) -> Result<EmbedReport> {
        let model = self.embedder.model_name().to_string();
        let records = self.store.list_all().await?;
        let kept_dimension = match mode {
            EmbedMode::Full => None,
            EmbedMode::Incremental => records
                .iter()
                .find_map(|r| r.embedding_for(&model))
                .map(<[f32]>::len),
        };
        let targets: Vec<FaqRecord> = match mode {
            EmbedMode::Full => records,
            EmbedMode::Incremental => records
                .into_iter()
                .filter(|r| r.embedding_for(&model).is_none())
                .collect(),
        };

        let texts: Vec<String> = targets.iter().map(|r| r.question.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            tracing::info!("Embedding {} FAQ questions with {model}", texts.len());
            self.embedder.embed_batch(&texts).await?
        };
        if vectors.len() != targets.len() {
            return Err(FaqError::EmbeddingProvider(ProviderError::InvalidResponse(
                format!("expected {} embeddings, got {}", targets.len(), vectors.len()),
            )));
        }

        let embedded: Vec<IndexedEntry> = targets
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| IndexedEntry {
                id: record.id,
                entry: record.entry(),
                vector,
            })
            .collect();
        check_vectors(&embedded, kept_dimension)?;
        let count = embedded.len();

        let indexed = if self.index.is_store_resident() {
            match mode {
                EmbedMode::Full => self.index.build(embedded).await?,
                EmbedMode::Incremental => {
                    for entry in embedded {
                        self.index.upsert(entry).await?;
                    }
                }
            }
            self.index.len().await?
        } else {
            self.write_store_embeddings(mode, &model, embedded).await?;
            self.rebuild_from_store().await?
        };

        tracing::info!("Embed run ({mode:?}): {count} embedded, {indexed} indexed");
        Ok(EmbedReport {
            mode,
            model,
            embedded: count,
            indexed,
        })
    }

    async fn write_store_embeddings(
        &self,
        mode: EmbedMode,
        model: &str,
        embedded: Vec<IndexedEntry>,
    ) -> Result<()> {
        let embedding = |vector: Vec<f32>| Embedding {
            model: model.to_string(),
            vector,
        };
        match mode {
            EmbedMode::Full => {
                let all = embedded
                    .into_iter()
                    .map(|e| (e.id, embedding(e.vector)))
                    .collect();
                self.store.replace_embeddings(all).await
            }
            EmbedMode::Incremental => {
                for e in embedded {
                    self.store.upsert_embedding(e.id, &embedding(e.vector)).await?;
                }
                Ok(())
            }
        }
    }

    /// Rebuild the index from the embeddings already stored for the current
    /// model. Entries without one are left out.
    pub async fn rebuild_from_store(&self) -> Result<usize> {
        let model = self.embedder.model_name();
        let records = self.store.list_all().await?;
        let total = records.len();

        let entries: Vec<IndexedEntry> = records
            .into_iter()
            .filter_map(|r| {
                let vector = r.embedding_for(model)?.to_vec();
                Some(IndexedEntry {
                    id: r.id,
                    entry: r.entry(),
                    vector,
                })
            })
            .collect();

        let count = entries.len();
        if count < total {
            tracing::warn!("{} FAQ entries have no {model} embedding and are not searchable", total - count);
        }
        self.index.build(entries).await?;
        Ok(count)
    }

    /// Bring a snapshot index up at startup: load it if it matches the
    /// configured model, otherwise rebuild it through an incremental run.
    pub async fn open_snapshot(&self, snapshot: &SnapshotIndex) -> Result<()> {
        match snapshot.load()? {
            LoadOutcome::Loaded { .. } => Ok(()),
            LoadOutcome::Missing => {
                tracing::info!(
                    "No index snapshot at {}, building one",
                    snapshot.persist_path().display()
                );
                self.embed(EmbedMode::Incremental).await.map(|_| ())
            }
            LoadOutcome::Stale { reason } => {
                tracing::warn!("Rebuilding stale index snapshot: {reason}");
                self.embed(EmbedMode::Incremental).await.map(|_| ())
            }
        }
    }
}

/// Reject vectors the index cannot hold before anything is written: zero or
/// non-finite vectors, and dimensions differing from each other or from the
/// embeddings kept in the store.
fn check_vectors(entries: &[IndexedEntry], kept_dimension: Option<usize>) -> Result<()> {
    let Some(dimension) = kept_dimension.or_else(|| entries.first().map(|e| e.vector.len())) else {
        return Ok(());
    };
    for e in entries {
        let reason = if e.vector.len() != dimension {
            format!("dimension {}, expected {dimension}", e.vector.len())
        } else if normalize(&e.vector).is_none() {
            "zero or non-finite vector".to_string()
        } else {
            continue;
        };
        return Err(FaqError::EmbeddingProvider(ProviderError::InvalidResponse(
            format!("unusable embedding for FAQ entry {}: {reason}", e.id),
        )));
    }
    Ok(())
}
