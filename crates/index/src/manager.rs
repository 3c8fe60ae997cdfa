//! The index engine: upload buffer, model, vector index and neighbour cache
//! behind one lock.
//!
//! Mutations (`train`, `index`, `delete`, `optimize`, `drop_index`) hold the
//! write lock for their whole duration, so readers never see a store and a
//! cache from different points in time. `find_similar` shares the read lock.
//! `status` reads a separately locked snapshot that every mutation refreshes
//! before releasing the write lock, so it never waits on a long `train` or
//! `optimize`.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use simserver_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheExport, NeighborCache};
use crate::config::{EngineConfig, RetrainPolicy};
use crate::model::{train_model, Model};
use crate::similarity::SimilarityIndex;
use crate::store::{IndexedEntry, VectorStore};
use crate::types::{Document, EngineState, FindOptions, IndexStatus, Neighbor, Query};

/// Complete engine state, for persistence.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub buffer: Vec<Document>,
    pub documents: Vec<Document>,
    pub entries: Vec<IndexedEntry>,
    pub generation: u64,
    pub model: Option<Model>,
    pub cache: Option<CacheExport>,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub last_optimized_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct EngineInner {
    model: Option<Arc<Model>>,
    index: SimilarityIndex,
    cache: NeighborCache,

    /// Raw documents behind every indexed id
    documents: BTreeMap<String, Document>,

    buffer: Vec<Document>,
    last_trained_at: Option<DateTime<Utc>>,
    last_optimized_at: Option<DateTime<Utc>>,
}

impl EngineInner {
    fn state(&self) -> EngineState {
        let store = self.index.store();
        if self.model.is_none() {
            EngineState::Empty
        } else if store.is_empty() {
            EngineState::Trained
        } else if self.cache.is_fresh(store.generation()) {
            EngineState::Optimized
        } else {
            EngineState::Indexed
        }
    }

    fn status(&self) -> IndexStatus {
        let store = self.index.store();
        IndexStatus {
            state: self.state(),
            documents_indexed: store.len(),
            documents_buffered: self.buffer.len(),
            model_trained: self.model.is_some(),
            model_method: self.model.as_ref().map(|m| m.method().to_string()),
            num_features: self.model.as_ref().map(|m| m.num_features()),
            cache_valid: self.cache.is_fresh(store.generation()),
            cached_lists: self.cache.len(),
            generation: store.generation(),
            last_trained_at: self.last_trained_at,
            last_optimized_at: self.last_optimized_at,
        }
    }

    /// Install a freshly trained model and apply the retrain policy to
    /// already indexed documents.
    fn install_model(&mut self, model: Model, policy: RetrainPolicy) {
        self.cache.invalidate_all();

        match policy {
            RetrainPolicy::Reembed => {
                for (id, doc) in &self.documents {
                    self.index.store_mut().upsert(id.clone(), model.embed(doc));
                }
                if !self.documents.is_empty() {
                    tracing::info!(
                        "Re-embedded {} indexed documents with the new model",
                        self.documents.len()
                    );
                }
            }
            RetrainPolicy::Drop => {
                if !self.documents.is_empty() {
                    tracing::info!(
                        "Dropped {} indexed documents after retraining",
                        self.documents.len()
                    );
                }
                self.index.store_mut().clear();
                self.documents.clear();
            }
        }

        self.last_trained_at = Some(model.trained_at());
        self.model = Some(Arc::new(model));
    }
}

/// A shared, mutable similarity index.
///
/// `IndexManager` is `Send + Sync`; wrap it in an `Arc` to share it between
/// sessions.
#[derive(Debug)]
pub struct IndexManager {
    config: EngineConfig,
    inner: RwLock<EngineInner>,
    status: Mutex<IndexStatus>,
}

impl IndexManager {
    /// Create an empty engine.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_inner(config, EngineInner::default())
    }

    fn with_inner(config: EngineConfig, inner: EngineInner) -> Self {
        let status = inner.status();
        Self {
            config,
            inner: RwLock::new(inner),
            status: Mutex::new(status),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn publish_status(&self, inner: &EngineInner) {
        *self.status.lock() = inner.status();
    }

    /// Append documents to the upload buffer.
    pub fn buffer(&self, documents: Vec<Document>) {
        let mut inner = self.inner.write();
        let added = documents.len();
        inner.buffer.extend(documents);

        tracing::info!(
            "Buffered {} documents ({} waiting)",
            added,
            inner.buffer.len()
        );
        self.publish_status(&inner);
    }

    /// Train a new model.
    ///
    /// Uses `corpus` if given, otherwise consumes the upload buffer; the
    /// buffer is cleared only after a successful fit. `method` defaults to
    /// the configured method.
    ///
    /// Fails with `InvalidArgument` when there is no training data or the
    /// method is unknown; in that case nothing changes.
    pub fn train(&self, corpus: Option<Vec<Document>>, method: Option<&str>) -> AppResult<()> {
        let start = Instant::now();
        let method = method.unwrap_or(self.config.method.as_str());

        let mut inner = self.inner.write();
        let from_buffer = corpus.is_none();

        let model = {
            let training: &[Document] = corpus.as_deref().unwrap_or(inner.buffer.as_slice());
            if training.is_empty() {
                return Err(AppError::InvalidArgument(
                    "No training corpus given and the upload buffer is empty".to_string(),
                ));
            }

            tracing::info!(
                "Training '{}' model on {} documents{}",
                method,
                training.len(),
                if from_buffer { " from the upload buffer" } else { "" }
            );
            train_model(method, training, &self.config)?
        };

        if from_buffer {
            inner.buffer.clear();
        }
        inner.install_model(model, self.config.retrain_policy);

        tracing::info!("Training finished in {:.2}s", start.elapsed().as_secs_f64());
        self.publish_status(&inner);
        Ok(())
    }

    /// Embed and upsert documents.
    ///
    /// Uses `documents` if given, otherwise consumes the upload buffer. A
    /// document whose id is already indexed replaces the old entry. Every
    /// document is validated and embedded before the index is touched, so a
    /// failing batch changes nothing.
    ///
    /// Fails with `Untrained` when no model is active and with
    /// `InvalidArgument` when a document has no id. Returns the number of
    /// documents indexed.
    pub fn index(&self, documents: Option<Vec<Document>>) -> AppResult<usize> {
        let start = Instant::now();
        let mut inner = self.inner.write();

        let model = inner.model.clone().ok_or_else(|| {
            AppError::Untrained("Train a model before indexing documents".to_string())
        })?;

        let vectors = {
            let batch: &[Document] = documents.as_deref().unwrap_or(inner.buffer.as_slice());
            embed_batch(&model, batch)?
        };

        let batch = match documents {
            Some(docs) => docs,
            None => std::mem::take(&mut inner.buffer),
        };

        let count = batch.len();
        for (doc, (id, vector)) in batch.into_iter().zip(vectors) {
            inner.index.store_mut().upsert(id.clone(), vector);
            inner.documents.insert(id, doc);
        }

        if count > 0 {
            inner.cache.invalidate_all();
        }

        tracing::info!(
            "Indexed {} documents in {:.2}s ({} total)",
            count,
            start.elapsed().as_secs_f64(),
            inner.index.store().len()
        );
        self.publish_status(&inner);
        Ok(count)
    }

    /// Remove documents by id. Unknown ids are ignored. Returns the number
    /// of documents removed.
    pub fn delete<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();

        let mut inner = self.inner.write();
        for id in &ids {
            inner.documents.remove(id);
        }
        let removed = inner.index.store_mut().delete(&ids);

        if removed > 0 {
            inner.cache.invalidate_all();
        }

        tracing::info!(
            "Deleted {} of {} requested documents ({} remaining)",
            removed,
            ids.len(),
            inner.index.store().len()
        );
        self.publish_status(&inner);
        removed
    }

    /// Precompute the neighbour list of every indexed document.
    pub fn optimize(&self) {
        let start = Instant::now();
        let mut inner = self.inner.write();

        let cap = self.config.neighbor_cap;
        let EngineInner { index, cache, .. } = &mut *inner;
        cache.rebuild(index, cap);
        inner.last_optimized_at = Some(Utc::now());

        tracing::info!(
            "Optimized {} documents (top {}) in {:.2}s",
            inner.cache.len(),
            cap,
            start.elapsed().as_secs_f64()
        );
        self.publish_status(&inner);
    }

    /// Find indexed documents similar to `query`.
    ///
    /// An id query must name an indexed document (`InvalidArgument`
    /// otherwise); it is answered from the neighbour cache when the cache is
    /// fresh and can satisfy the thresholds, else by a full scan. A document
    /// query ignores the document's id, embeds its text with the active
    /// model (`Untrained` if none) and always scans.
    pub fn find_similar(
        &self,
        query: impl Into<Query>,
        options: FindOptions,
    ) -> AppResult<Vec<Neighbor>> {
        if options.min_score.is_nan() {
            return Err(AppError::InvalidArgument("min_score must not be NaN".to_string()));
        }

        let inner = self.inner.read();
        let store = inner.index.store();

        match query.into() {
            Query::Id(id) => {
                if !store.contains(&id) {
                    return Err(AppError::InvalidArgument(format!(
                        "Unknown document id '{}'",
                        id
                    )));
                }

                if inner.cache.is_fresh(store.generation()) {
                    match inner
                        .cache
                        .lookup(&id, options.min_score, options.max_results)
                    {
                        Ok(hit) => {
                            tracing::debug!("Neighbour cache hit for '{}'", id);
                            return Ok(hit);
                        }
                        Err(miss) => tracing::debug!("Neighbour cache miss: {}", miss),
                    }
                }

                inner
                    .index
                    .query_by_id(&id, options.min_score, options.max_results)
            }
            Query::Document(doc) => {
                let model = inner.model.as_ref().ok_or_else(|| {
                    AppError::Untrained("Train a model before querying by document".to_string())
                })?;

                let vector = model.embed(&doc);
                Ok(inner
                    .index
                    .query(&vector, options.min_score, options.max_results))
            }
        }
    }

    /// Remove every indexed document and the neighbour cache. The model is
    /// kept only if `keep_model` is set. The upload buffer is left alone.
    pub fn drop_index(&self, keep_model: bool) {
        let mut inner = self.inner.write();
        let dropped = inner.index.store().len();

        inner.index.store_mut().clear();
        inner.documents.clear();
        inner.cache.invalidate_all();
        inner.last_optimized_at = None;

        if !keep_model {
            inner.model = None;
            inner.last_trained_at = None;
        }

        tracing::info!(
            "Dropped index ({} documents, model {})",
            dropped,
            if keep_model { "kept" } else { "dropped" }
        );
        self.publish_status(&inner);
    }

    /// Best-effort status snapshot; never waits for a running mutation.
    pub fn status(&self) -> IndexStatus {
        self.status.lock().clone()
    }

    /// The active model, for diagnostics.
    pub fn debug_model(&self) -> AppResult<Arc<Model>> {
        self.inner
            .read()
            .model
            .clone()
            .ok_or_else(|| AppError::Untrained("No model has been trained".to_string()))
    }

    /// The raw document indexed under `id`.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.inner.read().documents.get(id).cloned()
    }

    /// Export the complete engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.read();
        let store = inner.index.store();

        EngineSnapshot {
            buffer: inner.buffer.clone(),
            documents: inner.documents.values().cloned().collect(),
            entries: store.export(),
            generation: store.generation(),
            model: inner.model.as_ref().map(|m| m.as_ref().clone()),
            cache: inner.cache.export(),
            last_trained_at: inner.last_trained_at,
            last_optimized_at: inner.last_optimized_at,
        }
    }

    /// Rebuild an engine from an exported state.
    ///
    /// Fails with `Storage` if the snapshot is inconsistent: vectors without
    /// a model, or vectors and documents that do not match id for id.
    pub fn from_snapshot(config: EngineConfig, snapshot: EngineSnapshot) -> AppResult<Self> {
        if snapshot.model.is_none() && !snapshot.entries.is_empty() {
            return Err(AppError::Storage(
                "Snapshot has indexed vectors but no model".to_string(),
            ));
        }

        let documents: BTreeMap<String, Document> = snapshot
            .documents
            .into_iter()
            .map(|doc| {
                let id = doc.id.clone().ok_or_else(|| {
                    AppError::Storage("Snapshot contains an indexed document without id".to_string())
                })?;
                Ok((id, doc))
            })
            .collect::<AppResult<_>>()?;

        let consistent = documents.len() == snapshot.entries.len()
            && snapshot.entries.iter().all(|e| documents.contains_key(&e.id));
        if !consistent {
            return Err(AppError::Storage(
                "Snapshot vectors and documents do not match".to_string(),
            ));
        }

        let inner = EngineInner {
            model: snapshot.model.map(Arc::new),
            index: SimilarityIndex::new(VectorStore::restore(
                snapshot.entries,
                snapshot.generation,
            )),
            cache: snapshot.cache.map(NeighborCache::restore).unwrap_or_default(),
            documents,
            buffer: snapshot.buffer,
            last_trained_at: snapshot.last_trained_at,
            last_optimized_at: snapshot.last_optimized_at,
        };

        Ok(Self::with_inner(config, inner))
    }
}

/// Resolve ids and embed every document, failing on the first document
/// without an id.
fn embed_batch(model: &Model, batch: &[Document]) -> AppResult<Vec<(String, Vec<f32>)>> {
    batch
        .iter()
        .enumerate()
        .map(|(position, doc)| {
            let id = doc
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "Document at position {} has no id",
                        position
                    ))
                })?;
            Ok((id.to_string(), model.embed(doc)))
        })
        .collect()
}
