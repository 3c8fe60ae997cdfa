//! Precomputed nearest-neighbour lists ("optimize").
//!
//! The cache is all-or-nothing: any mutation of the index invalidates every
//! list, because a single changed document can reorder any other document's
//! top-k. Lookups never return stale data; they fail with [`CacheMiss`] and
//! the caller falls back to a full scan.

use std::collections::HashMap;
use thiserror::Error;

use crate::similarity::SimilarityIndex;
use crate::types::Neighbor;

/// Signal that a lookup cannot be answered from the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    #[error("neighbour cache is not built")]
    NotBuilt,

    #[error("no cached neighbours for '{0}'")]
    UnknownId(String),

    #[error("request for {requested} results exceeds cached list of {cap}")]
    BeyondCap { requested: usize, cap: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct CacheTable {
    cap: usize,

    /// Store generation the lists were computed against
    generation: u64,

    lists: HashMap<String, Vec<Neighbor>>,
}

/// Per-document neighbour lists built from a [`SimilarityIndex`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborCache {
    table: Option<CacheTable>,
}

impl NeighborCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the top-`cap` list of every indexed document, replacing any
    /// previous cache. O(N²·D).
    pub fn rebuild(&mut self, index: &SimilarityIndex, cap: usize) {
        let store = index.store();
        let lists = store
            .all()
            .map(|entry| {
                let neighbors = index.query(&entry.vector, f32::NEG_INFINITY, Some(cap));
                (entry.id.clone(), neighbors)
            })
            .collect();

        self.table = Some(CacheTable {
            cap,
            generation: store.generation(),
            lists,
        });
    }

    /// Cached neighbours of `id`, re-filtered by the thresholds.
    pub fn lookup(
        &self,
        id: &str,
        min_score: f32,
        max_results: Option<usize>,
    ) -> Result<Vec<Neighbor>, CacheMiss> {
        let table = self.table.as_ref().ok_or(CacheMiss::NotBuilt)?;
        let list = table
            .lists
            .get(id)
            .ok_or_else(|| CacheMiss::UnknownId(id.to_string()))?;

        // A full list may have dropped qualifying results at the cap
        let truncated = list.len() >= table.cap;
        let below_threshold = list.last().is_some_and(|last| last.score < min_score);
        let wants_more = max_results.map_or(true, |max| max > table.cap);

        if truncated && wants_more && !below_threshold {
            return Err(CacheMiss::BeyondCap {
                requested: max_results.unwrap_or(usize::MAX),
                cap: table.cap,
            });
        }

        let limit = max_results.unwrap_or(usize::MAX);
        Ok(list
            .iter()
            .take_while(|n| n.score >= min_score)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Drop every cached list.
    pub fn invalidate_all(&mut self) {
        if self.table.take().is_some() {
            tracing::debug!("Invalidated neighbour cache");
        }
    }

    /// True if the cache was built against store generation `generation`.
    pub fn is_fresh(&self, generation: u64) -> bool {
        self.table
            .as_ref()
            .is_some_and(|table| table.generation == generation)
    }

    pub fn is_built(&self) -> bool {
        self.table.is_some()
    }

    /// Number of cached lists.
    pub fn len(&self) -> usize {
        self.table.as_ref().map_or(0, |table| table.lists.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cap(&self) -> Option<usize> {
        self.table.as_ref().map(|table| table.cap)
    }

    pub fn generation(&self) -> Option<u64> {
        self.table.as_ref().map(|table| table.generation)
    }

    /// Cached lists, for persistence.
    pub(crate) fn export(&self) -> Option<CacheExport> {
        self.table.as_ref().map(|table| {
            let mut lists: Vec<_> = table
                .lists
                .iter()
                .map(|(id, list)| (id.clone(), list.clone()))
                .collect();
            lists.sort_by(|a, b| a.0.cmp(&b.0));
            CacheExport {
                cap: table.cap,
                generation: table.generation,
                lists,
            }
        })
    }

    /// Rebuild a cache from persisted lists.
    pub(crate) fn restore(export: CacheExport) -> Self {
        Self {
            table: Some(CacheTable {
                cap: export.cap,
                generation: export.generation,
                lists: export.lists.into_iter().collect(),
            }),
        }
    }
}

/// Persisted form of a built cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheExport {
    pub cap: usize,
    pub generation: u64,
    pub lists: Vec<(String, Vec<Neighbor>)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VectorStore;

    fn index() -> SimilarityIndex {
        let mut store = VectorStore::new();
        store.upsert("a", vec![1.0, 0.0]);
        store.upsert("b", vec![0.9, 0.1]);
        store.upsert("c", vec![0.5, 0.5]);
        store.upsert("d", vec![0.0, 1.0]);
        SimilarityIndex::new(store)
    }

    #[test]
    fn test_lookup_before_rebuild() {
        let cache = NeighborCache::new();
        assert_eq!(cache.lookup("a", 0.0, None), Err(CacheMiss::NotBuilt));
    }

    #[test]
    fn test_rebuild_matches_full_scan() {
        let index = index();
        let mut cache = NeighborCache::new();
        cache.rebuild(&index, 10);

        assert_eq!(cache.len(), 4);
        assert!(cache.is_fresh(index.store().generation()));

        for id in ["a", "b", "c", "d"] {
            let cached = cache.lookup(id, 0.0, None).unwrap();
            let scanned = index.query_by_id(id, 0.0, None).unwrap();
            assert_eq!(cached, scanned);
        }
    }

    #[test]
    fn test_lookup_unknown_id() {
        let mut cache = NeighborCache::new();
        cache.rebuild(&index(), 10);
        assert_eq!(
            cache.lookup("zzz", 0.0, None),
            Err(CacheMiss::UnknownId("zzz".to_string()))
        );
    }

    #[test]
    fn test_lookup_refilters() {
        let index = index();
        let mut cache = NeighborCache::new();
        cache.rebuild(&index, 10);

        let results = cache.lookup("a", 0.9, None).unwrap();
        assert_eq!(results.len(), 2);

        let results = cache.lookup("a", 0.0, Some(1)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn test_lookup_beyond_cap_misses() {
        let index = index();
        let mut cache = NeighborCache::new();
        cache.rebuild(&index, 2);

        // Unbounded request against a truncated list
        assert!(matches!(
            cache.lookup("a", 0.0, None),
            Err(CacheMiss::BeyondCap { .. })
        ));

        // Within the cap is fine
        assert_eq!(cache.lookup("a", 0.0, Some(2)).unwrap().len(), 2);

        // Threshold already cuts inside the list, so it is complete
        assert_eq!(cache.lookup("a", 0.999, None).unwrap().len(), 1);
    }

    #[test]
    fn test_invalidate_all() {
        let index = index();
        let mut cache = NeighborCache::new();
        cache.rebuild(&index, 10);
        cache.invalidate_all();

        assert!(!cache.is_built());
        assert!(!cache.is_fresh(index.store().generation()));
        assert_eq!(cache.lookup("a", 0.0, None), Err(CacheMiss::NotBuilt));
    }

    #[test]
    fn test_stale_generation_is_not_fresh() {
        let mut index = index();
        let mut cache = NeighborCache::new();
        cache.rebuild(&index, 10);

        index.store_mut().upsert("e", vec![1.0, 1.0]);
        assert!(!cache.is_fresh(index.store().generation()));
    }
}
