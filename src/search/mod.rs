//! Nearest-neighbor search over FAQ question embeddings.
//!
//! Both backends report cosine distance in `[0, 2]`, so
//! `similarity = 1 - distance` holds for either of them.

pub mod postgres;
pub mod vector;

use async_trait::async_trait;

use crate::error::{FaqError, Result};
use crate::models::{IndexHit, IndexedEntry};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` nearest entries, closest first. Empty when nothing is indexed.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Replace the whole index with `entries`. Readers see either the old
    /// content or the new content, never a mix.
    async fn build(&self, entries: Vec<IndexedEntry>) -> Result<()>;

    /// Insert or overwrite the vector of a single entry.
    async fn upsert(&self, entry: IndexedEntry) -> Result<()>;

    /// Number of searchable entries.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// True when the index reads vectors straight from the FAQ store, so
    /// writing the store is writing the index.
    fn is_store_resident(&self) -> bool;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

pub(crate) fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(FaqError::InvalidInput("k must be at least 1".to_string()));
    }
    Ok(())
}

/// Scale `v` to unit length. `None` for empty or zero vectors, which have
/// no direction to compare.
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if v.is_empty() || norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

/// Cosine distance between two unit vectors, kept inside `[0, 2]` despite
/// rounding.
pub fn cosine_distance_normalized(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let n = normalize(&[3.0, 4.0]).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_zero_and_empty() {
        assert!(normalize(&[0.0, 0.0]).is_none());
        assert!(normalize(&[]).is_none());
    }

    #[test]
    fn test_cosine_distance_bounds() {
        let a = normalize(&[1.0, 0.0]).unwrap();
        let b = normalize(&[-1.0, 0.0]).unwrap();
        let c = normalize(&[0.0, 1.0]).unwrap();
        assert!(cosine_distance_normalized(&a, &a) < 1e-6);
        assert!((cosine_distance_normalized(&a, &b) - 2.0).abs() < 1e-6);
        assert!((cosine_distance_normalized(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_check_k() {
        assert!(check_k(0).is_err());
        assert!(check_k(1).is_ok());
    }
}
