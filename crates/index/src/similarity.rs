//! Brute-force cosine similarity over a [`VectorStore`].

use simserver_core::AppResult;
use std::cmp::Ordering;

use crate::store::{vector_norm, VectorStore};
use crate::types::Neighbor;

/// Norms at or below this are treated as zero vectors.
pub const NORM_EPSILON: f32 = 1e-12;

/// Cosine similarity of two vectors, accumulated in f64 and clamped to
/// [-1, 1].
///
/// Returns 0.0 when either vector has (near-)zero norm or the lengths
/// differ, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norms(a, vector_norm(a), b, vector_norm(b))
}

fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if a.len() != b.len() || norm_a <= NORM_EPSILON || norm_b <= NORM_EPSILON {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();

    let score = dot / (f64::from(norm_a) * f64::from(norm_b));
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// Descending score, ties broken by ascending id.
pub fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Similarity search over an owned vector store.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    store: VectorStore,
}

impl SimilarityIndex {
    pub fn new(store: VectorStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VectorStore {
        &mut self.store
    }

    /// Rank every stored vector against `vector`.
    ///
    /// Results are ordered by descending score (ties by ascending id),
    /// exclude scores below `min_score`, and are truncated to `max_results`.
    pub fn query(
        &self,
        vector: &[f32],
        min_score: f32,
        max_results: Option<usize>,
    ) -> Vec<Neighbor> {
        let query_norm = vector_norm(vector);

        let mut results: Vec<Neighbor> = self
            .store
            .all()
            .filter_map(|entry| {
                let score = cosine_with_norms(vector, query_norm, &entry.vector, entry.norm);
                (score >= min_score).then(|| Neighbor::new(entry.id.clone(), score))
            })
            .collect();

        results.sort_by(rank_order);

        if let Some(max) = max_results {
            results.truncate(max);
        }

        tracing::trace!(
            "Scored {} vectors, returning {} results",
            self.store.len(),
            results.len()
        );

        results
    }

    /// Rank every stored vector against the vector stored for `id`.
    ///
    /// Fails with `NotFound` if `id` is not indexed. The id itself is part
    /// of the result with a score of (almost exactly) 1.0 unless cut by the
    /// thresholds.
    pub fn query_by_id(
        &self,
        id: &str,
        min_score: f32,
        max_results: Option<usize>,
    ) -> AppResult<Vec<Neighbor>> {
        let vector = self.store.get(id)?;
        Ok(self.query(vector, min_score, max_results))
    }
}
