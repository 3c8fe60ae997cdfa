//! Engine scenario tests over a small fixed corpus.

mod concurrency;

use crate::types::Document;

/// The nine-sentence toy corpus, with ids `en__0` to `en__8`.
pub(crate) fn toy_corpus() -> Vec<Document> {
    [
        "Human machine interface for lab abc computer applications",
        "A survey of user opinion of computer system response time",
        "The EPS user interface management system",
        "System and human system engineering testing of EPS",
        "Relation of user perceived response time to error measurement",
        "The generation of random binary unordered trees",
        "The intersection graph of paths in trees",
        "Graph minors IV Widths of trees and well quasi ordering",
        "Graph minors A survey",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| Document::new(format!("en__{}", i), *text))
    .collect()
}
