//! Token vocabulary with document frequencies.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sparse vector: `(term id, weight)` pairs sorted by term id.
pub type SparseVec = Vec<(u32, f32)>;

/// Mapping between tokens and integer term ids.
///
/// Ids are assigned in lexicographic token order so that two dictionaries
/// built from the same corpus are identical regardless of document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    token2id: BTreeMap<String, u32>,

    /// Number of documents containing each term, indexed by term id
    doc_freqs: Vec<u32>,

    /// Number of documents the dictionary was built from
    num_docs: usize,
}

impl Dictionary {
    /// Build a dictionary from tokenized documents.
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let mut freqs: BTreeMap<String, u32> = BTreeMap::new();
        let mut num_docs = 0;

        for tokens in documents {
            num_docs += 1;
            let unique: BTreeSet<&String> = tokens.iter().collect();
            for token in unique {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
        }

        Self::from_frequencies(freqs, num_docs)
    }

    fn from_frequencies(freqs: BTreeMap<String, u32>, num_docs: usize) -> Self {
        let mut token2id = BTreeMap::new();
        let mut doc_freqs = Vec::with_capacity(freqs.len());

        for (id, (token, df)) in freqs.into_iter().enumerate() {
            token2id.insert(token, id as u32);
            doc_freqs.push(df);
        }

        Self {
            token2id,
            doc_freqs,
            num_docs,
        }
    }

    /// Drop rare and overly common tokens.
    ///
    /// Keeps tokens that appear in at least `no_below` documents and in at
    /// most `no_above` (a fraction) of all documents, then keeps only the
    /// `keep_n` most frequent of those. Term ids are reassigned afterwards.
    pub fn filter_extremes(&mut self, no_below: u32, no_above: f32, keep_n: usize) {
        let max_df = (f64::from(no_above) * self.num_docs as f64).floor() as u64;

        let mut kept: Vec<(String, u32)> = self
            .token2id
            .iter()
            .map(|(token, &id)| (token.clone(), self.doc_freqs[id as usize]))
            .filter(|(_, df)| *df >= no_below && u64::from(*df) <= max_df)
            .collect();

        if kept.len() > keep_n {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(keep_n);
        }

        let before = self.len();
        *self = Self::from_frequencies(kept.into_iter().collect(), self.num_docs);

        tracing::debug!(
            "Filtered dictionary from {} to {} tokens (no_below={}, no_above={}, keep_n={})",
            before,
            self.len(),
            no_below,
            no_above,
            keep_n
        );
    }

    /// Convert tokens into a bag-of-words vector. Unknown tokens are ignored.
    pub fn doc2bow(&self, tokens: &[String]) -> SparseVec {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in tokens {
            if let Some(&id) = self.token2id.get(token) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }
        counts.into_iter().collect()
    }

    /// Term id of a token.
    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token2id.get(token).copied()
    }

    /// Document frequency of a term id.
    pub fn doc_freq(&self, id: u32) -> u32 {
        self.doc_freqs.get(id as usize).copied().unwrap_or(0)
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn len(&self) -> usize {
        self.token2id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token2id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample() -> Dictionary {
        let docs = [
            toks(&["graph", "trees", "trees"]),
            toks(&["graph", "minors"]),
            toks(&["graph", "survey"]),
        ];
        Dictionary::from_documents(docs.iter().map(Vec::as_slice))
    }

    #[test]
    fn test_ids_are_sorted_by_token() {
        let dict = sample();
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.num_docs(), 3);
        assert_eq!(dict.id_of("graph"), Some(0));
        assert_eq!(dict.id_of("minors"), Some(1));
        assert_eq!(dict.id_of("survey"), Some(2));
        assert_eq!(dict.id_of("trees"), Some(3));
    }

    #[test]
    fn test_doc_freq_counts_documents_not_occurrences() {
        let dict = sample();
        assert_eq!(dict.doc_freq(dict.id_of("graph").unwrap()), 3);
        assert_eq!(dict.doc_freq(dict.id_of("trees").unwrap()), 1);
    }

    #[test]
    fn test_doc2bow() {
        let dict = sample();
        let bow = dict.doc2bow(&toks(&["trees", "unknown", "graph", "trees"]));
        assert_eq!(bow, vec![(0, 1.0), (3, 2.0)]);
    }

    #[test]
    fn test_filter_extremes() {
        let mut dict = sample();
        dict.filter_extremes(1, 0.5, 100);

        // "graph" appears in every document and is dropped
        assert_eq!(dict.len(), 3);
        assert!(dict.id_of("graph").is_none());
        assert_eq!(dict.id_of("minors"), Some(0));
    }

    #[test]
    fn test_filter_extremes_keep_n() {
        let mut dict = sample();
        dict.filter_extremes(1, 1.0, 1);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.id_of("graph"), Some(0));
    }
}
