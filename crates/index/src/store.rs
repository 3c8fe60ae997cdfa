//! In-memory vector store keyed by document id.

use simserver_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One indexed vector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub id: String,
    pub vector: Vec<f32>,

    /// Euclidean norm of `vector`, computed once at upsert
    pub norm: f32,

    /// Store generation at which this entry was written
    pub version: u64,
}

impl IndexedEntry {
    pub(crate) fn new(id: String, vector: Vec<f32>, version: u64) -> Self {
        let norm = vector_norm(&vector);
        Self {
            id,
            vector,
            norm,
            version,
        }
    }
}

/// Euclidean norm accumulated in f64.
pub fn vector_norm(vector: &[f32]) -> f32 {
    vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt() as f32
}

/// Mapping from document id to its embedding.
///
/// Every mutation bumps `generation`; an upserted entry's `version` is the
/// generation it was written at, so versions strictly increase on overwrite
/// and are never reused across delete/re-insert.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    entries: BTreeMap<String, Arc<IndexedEntry>>,
    generation: u64,
}

/// Point-in-time view of a store, ordered by id.
pub type Snapshot = std::vec::IntoIter<Arc<IndexedEntry>>;

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vector for `id`. Returns the entry's new version.
    pub fn upsert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> u64 {
        self.generation += 1;
        let id = id.into();
        let entry = IndexedEntry::new(id.clone(), vector, self.generation);
        self.entries.insert(id, Arc::new(entry));
        self.generation
    }

    /// Remove entries by id. Unknown ids are ignored. Returns how many
    /// entries were removed.
    pub fn delete<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for id in ids {
            let id: &str = id.as_ref();
            if self.entries.remove(id).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.generation += 1;
        }
        removed
    }

    /// Vector stored for `id`.
    pub fn get(&self, id: &str) -> AppResult<&[f32]> {
        self.entries
            .get(id)
            .map(|entry| entry.vector.as_slice())
            .ok_or_else(|| AppError::NotFound(format!("No indexed document with id '{}'", id)))
    }

    pub fn entry(&self, id: &str) -> Option<&Arc<IndexedEntry>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of all entries at call time. Later mutations of the store do
    /// not affect an existing snapshot.
    pub fn all(&self) -> Snapshot {
        self.entries.values().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Iterate ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.generation += 1;
        }
    }

    /// Mutation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rebuild a store from persisted entries.
    pub(crate) fn restore(entries: Vec<IndexedEntry>, generation: u64) -> Self {
        let generation = entries
            .iter()
            .map(|e| e.version)
            .max()
            .unwrap_or(0)
            .max(generation);

        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.id.clone(), Arc::new(e)))
                .collect(),
            generation,
        }
    }

    /// Entry values with their versions, for persistence.
    pub(crate) fn export(&self) -> Vec<IndexedEntry> {
        self.entries.values().map(|e| e.as_ref().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_get() {
        let mut store = VectorStore::new();
        store.upsert("a", vec![1.0, 0.0]);

        assert_eq!(store.get("a").unwrap(), &[1.0, 0.0]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_and_bumps_version() {
        let mut store = VectorStore::new();
        let v1 = store.upsert("a", vec![1.0, 0.0]);
        let v2 = store.upsert("a", vec![0.0, 1.0]);

        assert!(v2 > v1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap(), &[0.0, 1.0]);
        assert_eq!(store.entry("a").unwrap().version, v2);
    }

    #[test]
    fn test_version_not_reused_after_delete() {
        let mut store = VectorStore::new();
        let v1 = store.upsert("a", vec![1.0]);
        store.delete(["a"]);
        let v2 = store.upsert("a", vec![1.0]);
        assert!(v2 > v1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = VectorStore::new();
        assert!(matches!(store.get("nope"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut store = VectorStore::new();
        store.upsert("a", vec![1.0]);
        store.upsert("b", vec![2.0]);

        assert_eq!(store.delete(["a", "missing"]), 1);
        let generation = store.generation();
        assert_eq!(store.delete(["a", "missing"]), 0);

        assert_eq!(store.generation(), generation);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_snapshot_is_isolated_from_mutation() {
        let mut store = VectorStore::new();
        store.upsert("a", vec![1.0]);
        store.upsert("b", vec![2.0]);

        let snapshot = store.all();
        store.delete(["a"]);
        store.upsert("c", vec![3.0]);

        let ids: Vec<String> = snapshot.map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        // A new call sees the new state
        let ids: Vec<String> = store.all().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_norm_is_cached() {
        let mut store = VectorStore::new();
        store.upsert("a", vec![3.0, 4.0]);
        assert!((store.entry("a").unwrap().norm - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_restore_keeps_generation_monotonic() {
        let mut store = VectorStore::new();
        store.upsert("a", vec![1.0]);
        store.upsert("b", vec![1.0]);

        let restored = VectorStore::restore(store.export(), 0);
        assert_eq!(restored.generation(), store.generation());
        assert_eq!(restored.len(), 2);
    }
}
