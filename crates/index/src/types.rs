//! Index engine type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A document as uploaded by a client.
///
/// Only `text` is consumed by the model. Any other JSON fields are kept in
/// `metadata` verbatim and never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied identifier; absent for ad-hoc queries
    #[serde(default)]
    pub id: Option<String>,

    /// Text content
    pub text: String,

    /// Opaque passthrough fields
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Create a document with an id and no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create an id-less document, used for ad-hoc queries.
    pub fn anonymous(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// One ranked similarity result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Id of the indexed document
    pub id: String,

    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

impl Neighbor {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// What to search for in `find_similar`.
#[derive(Debug, Clone)]
pub enum Query {
    /// An already indexed document, by id
    Id(String),

    /// An ad-hoc document; its id, if any, is ignored
    Document(Document),
}

impl From<&str> for Query {
    fn from(id: &str) -> Self {
        Query::Id(id.to_string())
    }
}

impl From<String> for Query {
    fn from(id: String) -> Self {
        Query::Id(id)
    }
}

impl From<Document> for Query {
    fn from(doc: Document) -> Self {
        Query::Document(doc)
    }
}

/// Thresholds applied to `find_similar` results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Minimum score for a result to be returned
    pub min_score: f32,

    /// Maximum number of results; `None` returns every match
    pub max_results: Option<usize>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            max_results: None,
        }
    }
}

impl FindOptions {
    /// Create options with the default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum score
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set maximum results
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Lifecycle state of an index engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No model trained
    Empty,
    /// Model trained, nothing indexed
    Trained,
    /// Documents indexed, neighbour cache not valid
    Indexed,
    /// Neighbour cache valid for the current index contents
    Optimized,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Empty => "empty",
            EngineState::Trained => "trained",
            EngineState::Indexed => "indexed",
            EngineState::Optimized => "optimized",
        };
        f.write_str(name)
    }
}

/// Best-effort observability snapshot of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub state: EngineState,

    /// Number of indexed documents
    pub documents_indexed: usize,

    /// Documents waiting in the upload buffer
    pub documents_buffered: usize,

    pub model_trained: bool,

    /// Training method of the active model
    pub model_method: Option<String>,

    /// Vector dimensionality of the active model
    pub num_features: Option<usize>,

    pub cache_valid: bool,

    /// Number of precomputed neighbour lists
    pub cached_lists: usize,

    /// Store mutation counter
    pub generation: u64,

    pub last_trained_at: Option<DateTime<Utc>>,
    pub last_optimized_at: Option<DateTime<Utc>>,
}

impl Default for IndexStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Empty,
            documents_indexed: 0,
            documents_buffered: 0,
            model_trained: false,
            model_method: None,
            num_features: None,
            cache_valid: false,
            cached_lists: 0,
            generation: 0,
            last_trained_at: None,
            last_optimized_at: None,
        }
    }
}
