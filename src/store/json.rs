use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{FaqError, Result};
use crate::models::{Embedding, FaqEntry, FaqId, FaqRecord};
use crate::store::{normalize_entry, FaqStore};

/// FAQ store kept in memory and persisted to a single JSON file.
///
/// Writes go to a copy of the records which is persisted (temp file +
/// rename) before it replaces the in-memory state, so a failed write leaves
/// both the file and memory as they were.
pub struct JsonFaqStore {
    records: Mutex<Vec<FaqRecord>>,
    persist_path: PathBuf,
}

impl JsonFaqStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records: Vec<FaqRecord> = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            Vec::new()
        };

        tracing::info!("Opened FAQ store at {} ({} entries)", path.display(), records.len());
        Ok(Self {
            records: Mutex::new(records),
            persist_path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `change` to a copy of the records, persist it, then publish it.
    fn update<T>(&self, change: impl FnOnce(&mut Vec<FaqRecord>) -> Result<T>) -> Result<T> {
        let mut records = self.records.lock();
        let mut next = records.clone();
        let out = change(&mut next)?;
        persist(&self.persist_path, &next)?;
        *records = next;
        Ok(out)
    }
}

fn persist(path: &Path, records: &[FaqRecord]) -> Result<()> {
    let data = serde_json::to_string_pretty(records)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn not_found(id: FaqId) -> FaqError {
    FaqError::Store(format!("no FAQ entry with id {id}"))
}

#[async_trait]
impl FaqStore for JsonFaqStore {
    async fn list_all(&self) -> Result<Vec<FaqRecord>> {
        let mut records = self.records.lock().clone();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn insert_if_absent(&self, entry: FaqEntry) -> Result<bool> {
        let entry = normalize_entry(entry)?;
        let exists = self
            .records
            .lock()
            .iter()
            .any(|r| r.question == entry.question);
        if exists {
            return Ok(false);
        }

        self.update(|records| {
            // Re-check under the same lock as the write.
            if records.iter().any(|r| r.question == entry.question) {
                return Ok(false);
            }
            let next_id = records.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
            records.push(FaqRecord {
                id: FaqId(next_id),
                question: entry.question,
                answer: entry.answer,
                embedding: None,
            });
            Ok(true)
        })
    }

    async fn upsert_embedding(&self, id: FaqId, embedding: &Embedding) -> Result<()> {
        self.update(|records| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| not_found(id))?;
            record.embedding = Some(embedding.clone());
            Ok(())
        })
    }

    async fn replace_embeddings(&self, embeddings: Vec<(FaqId, Embedding)>) -> Result<()> {
        let mut by_id: HashMap<FaqId, Embedding> = embeddings.into_iter().collect();
        self.update(|records| {
            if let Some(unknown) = by_id.keys().find(|id| !records.iter().any(|r| r.id == **id)) {
                return Err(not_found(*unknown));
            }
            for record in records.iter_mut() {
                record.embedding = by_id.remove(&record.id);
            }
            Ok(())
        })
    }
}
