//! Document similarity index engine.
//!
//! Documents are buffered, a model is trained over them, documents are
//! embedded and indexed by id, and queries rank indexed documents by cosine
//! similarity. An optional neighbour cache precomputes every document's top
//! matches.

pub mod cache;
pub mod config;
pub mod manager;
pub mod model;
pub mod session;
pub mod similarity;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{EngineConfig, RetrainPolicy};
pub use manager::{EngineSnapshot, IndexManager};
pub use model::{train_model, Model, ModelSummary, TrainingMethod};
pub use session::Session;
pub use similarity::{cosine_similarity, SimilarityIndex};
pub use store::VectorStore;
pub use types::{Document, EngineState, FindOptions, IndexStatus, Neighbor, Query};
