//! Trained document models.
//!
//! A [`Model`] turns document text into a dense vector. Models are fitted
//! by [`train_model`] from a corpus and a method name:
//!
//! - `tfidf`: TF-IDF weights over the vocabulary
//! - `logentropy`: log-entropy weights over the vocabulary
//! - `lsi`: TF-IDF followed by a truncated SVD projection

pub mod dictionary;
pub mod linalg;
pub mod lsi;
pub mod tokenizer;
pub mod weighting;

pub use dictionary::{Dictionary, SparseVec};
pub use lsi::LsiModel;
pub use weighting::{LogEntropyModel, TermWeighting, TfidfModel};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simserver_core::{AppError, AppResult};
use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::types::Document;

/// Supported training methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMethod {
    Tfidf,
    LogEntropy,
    Lsi,
}

impl FromStr for TrainingMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tfidf" => Ok(TrainingMethod::Tfidf),
            "logentropy" => Ok(TrainingMethod::LogEntropy),
            "lsi" => Ok(TrainingMethod::Lsi),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown training method: '{}'. Supported methods: lsi, tfidf, logentropy",
                other
            ))),
        }
    }
}

impl fmt::Display for TrainingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingMethod::Tfidf => "tfidf",
            TrainingMethod::LogEntropy => "logentropy",
            TrainingMethod::Lsi => "lsi",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Transform {
    Tfidf { tfidf: TfidfModel },
    LogEntropy { weights: LogEntropyModel },
    Lsi { tfidf: TfidfModel, lsi: LsiModel },
}

/// A trained model: vocabulary plus a vector transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    method: TrainingMethod,
    dictionary: Dictionary,
    transform: Transform,
    trained_at: DateTime<Utc>,
}

/// Diagnostic description of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub method: TrainingMethod,
    pub num_features: usize,
    pub vocabulary_size: usize,
    pub num_training_docs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singular_values: Option<Vec<f32>>,
    pub trained_at: DateTime<Utc>,
}

impl Model {
    pub fn method(&self) -> TrainingMethod {
        self.method
    }

    /// Dimensionality of the vectors this model produces.
    pub fn num_features(&self) -> usize {
        match &self.transform {
            Transform::Tfidf { .. } | Transform::LogEntropy { .. } => self.dictionary.len(),
            Transform::Lsi { lsi, .. } => lsi.num_topics(),
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Embed a document. Only its text is used.
    pub fn embed(&self, document: &Document) -> Vec<f32> {
        self.embed_text(&document.text)
    }

    /// Embed raw text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let bow = self.dictionary.doc2bow(&tokenizer::tokenize(text));
        match &self.transform {
            Transform::Tfidf { tfidf } => densify(&tfidf.weigh(&bow), self.dictionary.len()),
            Transform::LogEntropy { weights } => {
                densify(&weights.weigh(&bow), self.dictionary.len())
            }
            Transform::Lsi { tfidf, lsi } => lsi.project(&tfidf.weigh(&bow)),
        }
    }

    pub fn summary(&self) -> ModelSummary {
        let singular_values = match &self.transform {
            Transform::Lsi { lsi, .. } => Some(lsi.singular_values().to_vec()),
            _ => None,
        };

        ModelSummary {
            method: self.method,
            num_features: self.num_features(),
            vocabulary_size: self.dictionary.len(),
            num_training_docs: self.dictionary.num_docs(),
            singular_values,
            trained_at: self.trained_at,
        }
    }
}

fn densify(vec: &[(u32, f32)], len: usize) -> Vec<f32> {
    let mut dense = vec![0.0; len];
    for &(id, w) in vec {
        if let Some(slot) = dense.get_mut(id as usize) {
            *slot = w;
        }
    }
    dense
}

/// Fit a model over `corpus` with the named method.
///
/// Fails with `InvalidArgument` for an empty corpus, an unknown method, or a
/// corpus with no usable tokens after filtering.
pub fn train_model(method: &str, corpus: &[Document], config: &EngineConfig) -> AppResult<Model> {
    let method: TrainingMethod = method.parse()?;

    if corpus.is_empty() {
        return Err(AppError::InvalidArgument(
            "Cannot train a model on an empty corpus".to_string(),
        ));
    }

    let tokenized: Vec<Vec<String>> = corpus
        .iter()
        .map(|doc| tokenizer::tokenize(&doc.text))
        .collect();

    let mut dictionary = Dictionary::from_documents(tokenized.iter().map(Vec::as_slice));
    dictionary.filter_extremes(config.no_below, config.no_above, config.keep_n);

    if dictionary.is_empty() {
        return Err(AppError::InvalidArgument(
            "Training corpus has no usable tokens".to_string(),
        ));
    }

    let bows: Vec<SparseVec> = tokenized.iter().map(|t| dictionary.doc2bow(t)).collect();

    let transform = match method {
        TrainingMethod::Tfidf => Transform::Tfidf {
            tfidf: TfidfModel::fit(&dictionary),
        },
        TrainingMethod::LogEntropy => Transform::LogEntropy {
            weights: LogEntropyModel::fit(&bows, dictionary.len()),
        },
        TrainingMethod::Lsi => {
            let tfidf = TfidfModel::fit(&dictionary);
            let weighted: Vec<SparseVec> = bows.iter().map(|b| tfidf.weigh(b)).collect();
            let lsi = LsiModel::fit(&weighted, dictionary.len(), config.num_topics);
            Transform::Lsi { tfidf, lsi }
        }
    };

    let model = Model {
        method,
        dictionary,
        transform,
        trained_at: Utc::now(),
    };

    tracing::info!(
        "Trained {} model on {} documents ({} terms, {} features)",
        method,
        corpus.len(),
        model.dictionary.len(),
        model.num_features()
    );

    Ok(model)
}
