use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{FaqError, Result};
use crate::models::{FaqEntry, FaqId, IndexHit, IndexedEntry};
use crate::search::{check_k, cosine_distance_normalized, normalize, VectorIndex};

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// One indexed vector and the entry it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotSlot {
    id: FaqId,
    entry: FaqEntry,
    /// Unit length.
    vector: Vec<f32>,
}

/// Immutable flat index; also the on-disk snapshot format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FlatIndex {
    format_version: u32,
    model: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    slots: Vec<SnapshotSlot>,
}

impl FlatIndex {
    fn from_entries(model: &str, entries: Vec<IndexedEntry>) -> Result<Self> {
        let dimension = entries.first().map(|e| e.vector.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(entries.len());

        for e in entries {
            if e.vector.len() != dimension {
                return Err(FaqError::Index(format!(
                    "entry {} has dimension {}, expected {dimension}",
                    e.id,
                    e.vector.len()
                )));
            }
            if !seen.insert(e.id) {
                return Err(FaqError::Index(format!("entry {} indexed twice", e.id)));
            }
            let vector = normalize(&e.vector).ok_or_else(|| {
                FaqError::Index(format!("entry {} has a zero or non-finite vector", e.id))
            })?;
            slots.push(SnapshotSlot {
                id: e.id,
                entry: e.entry,
                vector,
            });
        }

        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            model: model.to_string(),
            dimension,
            built_at: Utc::now(),
            slots,
        })
    }

    fn to_entries(&self) -> Vec<IndexedEntry> {
        self.slots
            .iter()
            .map(|s| IndexedEntry {
                id: s.id,
                entry: s.entry.clone(),
                vector: s.vector.clone(),
            })
            .collect()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if self.slots.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(FaqError::Index(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        // A zero query has no direction; it is equally far from everything.
        let query = normalize(query);
        let mut scored: Vec<(f32, &SnapshotSlot)> = self
            .slots
            .iter()
            .map(|s| {
                let distance = match &query {
                    Some(q) => cosine_distance_normalized(q, &s.vector),
                    None => 1.0,
                };
                (distance, s)
            })
            .collect();

        // Ascending by distance; ties broken by id so results are stable.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, s)| IndexHit {
                id: s.id,
                entry: s.entry.clone(),
                distance,
            })
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// What [`SnapshotIndex::load`] found on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Snapshot loaded and published.
    Loaded { entries: usize },
    /// No snapshot file yet.
    Missing,
    /// A snapshot exists but cannot be used as-is and must be rebuilt.
    Stale { reason: String },
}

/// In-process cosine index persisted as a snapshot file.
///
/// The published index is immutable. Rebuilds and upserts construct a new
/// index, persist it, and only then swap the shared handle, so readers never
/// see a partially built index.
pub struct SnapshotIndex {
    current: RwLock<Option<Arc<FlatIndex>>>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
    persist_path: PathBuf,
    model: String,
}

impl SnapshotIndex {
    /// An index that serves nothing until [`load`](Self::load) or a build.
    pub fn new(persist_path: &Path, model: &str) -> Self {
        Self {
            current: RwLock::new(None),
            writer: Mutex::new(()),
            persist_path: persist_path.to_path_buf(),
            model: model.to_string(),
        }
    }

    pub fn persist_path(&self) -> &Path {
        &self.persist_path
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Read the snapshot from disk and publish it. Snapshots built with a
    /// different embedding model or format are reported stale, not loaded.
    pub fn load(&self) -> Result<LoadOutcome> {
        if !self.persist_path.exists() {
            return Ok(LoadOutcome::Missing);
        }

        let data = std::fs::read_to_string(&self.persist_path)?;
        let index: FlatIndex = match serde_json::from_str(&data) {
            Ok(index) => index,
            Err(e) => {
                return Ok(LoadOutcome::Stale {
                    reason: format!("unreadable snapshot: {e}"),
                })
            }
        };

        if index.format_version != SNAPSHOT_FORMAT_VERSION {
            return Ok(LoadOutcome::Stale {
                reason: format!("snapshot format version {}", index.format_version),
            });
        }
        if index.model != self.model {
            return Ok(LoadOutcome::Stale {
                reason: format!(
                    "snapshot built with {}, configured model is {}",
                    index.model, self.model
                ),
            });
        }

        let entries = index.slots.len();
        tracing::info!(
            "Loaded index snapshot from {} ({entries} entries, built {})",
            self.persist_path.display(),
            index.built_at
        );
        *self.current.write() = Some(Arc::new(index));
        Ok(LoadOutcome::Loaded { entries })
    }

    fn snapshot(&self) -> Option<Arc<FlatIndex>> {
        self.current.read().clone()
    }

    fn publish(&self, index: FlatIndex) -> Result<()> {
        index.save(&self.persist_path)?;
        *self.current.write() = Some(Arc::new(index));
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SnapshotIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        check_k(k)?;
        let index = self.snapshot().ok_or_else(|| {
            FaqError::IndexUnavailable(format!(
                "no index snapshot loaded from {}; run the embed job",
                self.persist_path.display()
            ))
        })?;
        index.search(query, k)
    }

    async fn build(&self, entries: Vec<IndexedEntry>) -> Result<()> {
        let _writer = self.writer.lock();
        let index = FlatIndex::from_entries(&self.model, entries)?;
        let count = index.slots.len();
        self.publish(index)?;
        tracing::info!("Built index snapshot with {count} entries");
        Ok(())
    }

    async fn upsert(&self, entry: IndexedEntry) -> Result<()> {
        let _writer = self.writer.lock();
        let mut entries = self
            .snapshot()
            .map(|index| index.to_entries())
            .unwrap_or_default();

        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }

        let index = FlatIndex::from_entries(&self.model, entries)?;
        self.publish(index)
    }

    async fn len(&self) -> Result<usize> {
        self.snapshot()
            .map(|index| index.slots.len())
            .ok_or_else(|| FaqError::IndexUnavailable("no index snapshot loaded".to_string()))
    }

    fn is_store_resident(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, question: &str, vector: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            id: FaqId(id),
            entry: FaqEntry::new(question, format!("answer to {question}")),
            vector,
        }
    }

    fn sample() -> Vec<IndexedEntry> {
        vec![
            entry(1, "password", vec![0.9, 0.1, 0.1]),
            entry(2, "billing", vec![0.1, 0.9, 0.1]),
            entry(3, "shipping", vec![0.1, 0.1, 0.9]),
        ]
    }

    #[tokio::test]
    async fn test_search_before_load_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        let err = index.search(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, FaqError::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(sample()).await.unwrap();

        let hits = index.search(&[0.1, 0.95, 0.05], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, FaqId(2));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits.iter().all(|h| (0.0..=2.0).contains(&h.distance)));
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(sample()).await.unwrap();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1).await.unwrap().len(), 1);
        assert!(index.search(&[1.0, 0.0, 0.0], 0).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(Vec::new()).await.unwrap();
        assert!(index.search(&[1.0, 0.0], 1).await.unwrap().is_empty());
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(sample()).await.unwrap();
        let err = index.search(&[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, FaqError::Index(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_mixed_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        let entries = vec![entry(1, "a", vec![1.0, 0.0]), entry(2, "b", vec![1.0])];
        assert!(index.build(entries).await.is_err());
        assert!(!index.is_loaded());
    }

    #[tokio::test]
    async fn test_build_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        let entries = vec![entry(1, "a", vec![1.0, 0.0]), entry(1, "b", vec![0.0, 1.0])];

        let err = index.build(entries).await.unwrap_err();
        assert!(matches!(err, FaqError::Index(ref msg) if msg.contains("indexed twice")));
        assert!(!index.is_loaded());
        assert!(!index.persist_path().exists());
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(sample()).await.unwrap();

        let bad = vec![entry(1, "a", vec![0.0, 0.0, 0.0])];
        assert!(index.build(bad).await.is_err());

        assert_eq!(index.len().await.unwrap(), 3);
        let reloaded = SnapshotIndex::new(index.persist_path(), "m");
        assert_eq!(reloaded.load().unwrap(), LoadOutcome::Loaded { entries: 3 });
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index").join("faq_index.json");
        let index = SnapshotIndex::new(&path, "m");
        index.build(sample()).await.unwrap();
        let before = index.search(&[0.2, 0.3, 0.8], 3).await.unwrap();

        let reloaded = SnapshotIndex::new(&path, "m");
        assert_eq!(reloaded.load().unwrap(), LoadOutcome::Loaded { entries: 3 });
        let after = reloaded.search(&[0.2, 0.3, 0.8], 3).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_load_reports_missing_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        assert_eq!(SnapshotIndex::new(&path, "m").load().unwrap(), LoadOutcome::Missing);

        SnapshotIndex::new(&path, "old-model").build(sample()).await.unwrap();
        let index = SnapshotIndex::new(&path, "new-model");
        assert!(matches!(index.load().unwrap(), LoadOutcome::Stale { .. }));
        assert!(!index.is_loaded());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(index.load().unwrap(), LoadOutcome::Stale { .. }));
    }

    #[tokio::test]
    async fn test_upsert_inserts_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.build(sample()).await.unwrap();

        index.upsert(entry(4, "returns", vec![1.0, 1.0, 0.0])).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 4);

        // Move entry 1 to the "shipping" direction.
        index.upsert(entry(1, "password", vec![0.0, 0.0, 1.0])).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 4);
        let hits = index.search(&[0.0, 0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].id, FaqId(1));
    }

    #[tokio::test]
    async fn test_upsert_on_unloaded_index_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let index = SnapshotIndex::new(&dir.path().join("index.json"), "m");
        index.upsert(entry(7, "only", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SnapshotIndex::new(&dir.path().join("index.json"), "m"));
        index.build(sample()).await.unwrap();

        let reader = {
            let index = index.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let n = index.search(&[1.0, 0.0, 0.0], 10).await.unwrap().len();
                    assert!(n == 3 || n == 4, "saw partial index of {n} entries");
                }
            })
        };

        let mut bigger = sample();
        bigger.push(entry(4, "returns", vec![1.0, 1.0, 0.0]));
        for i in 0..20 {
            let entries = if i % 2 == 0 { bigger.clone() } else { sample() };
            index.build(entries).await.unwrap();
        }

        reader.await.unwrap();
    }
}
