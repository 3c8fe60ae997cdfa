//! Term weighting schemes applied to bag-of-words vectors.

use serde::{Deserialize, Serialize};

use super::dictionary::{Dictionary, SparseVec};

/// A fitted reweighting of bag-of-words vectors.
pub trait TermWeighting {
    /// Reweight a bag-of-words vector. The result is L2-normalised.
    fn weigh(&self, bow: &[(u32, f32)]) -> SparseVec;
}

/// TF-IDF with `idf = log2(N / df)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfModel {
    idfs: Vec<f32>,
}

impl TfidfModel {
    /// Fit inverse document frequencies from a dictionary.
    pub fn fit(dictionary: &Dictionary) -> Self {
        let num_docs = dictionary.num_docs().max(1) as f64;
        let idfs = (0..dictionary.len() as u32)
            .map(|id| {
                let df = f64::from(dictionary.doc_freq(id).max(1));
                (num_docs / df).log2() as f32
            })
            .collect();

        Self { idfs }
    }

    pub fn idf(&self, id: u32) -> f32 {
        self.idfs.get(id as usize).copied().unwrap_or(0.0)
    }
}

impl TermWeighting for TfidfModel {
    fn weigh(&self, bow: &[(u32, f32)]) -> SparseVec {
        let weighted = bow
            .iter()
            .map(|&(id, tf)| (id, tf * self.idf(id)))
            .filter(|&(_, w)| w != 0.0)
            .collect();
        normalize(weighted)
    }
}

/// Log-entropy weighting: `ln(1 + tf) * g`, where the global weight `g` is
/// one minus the normalised entropy of the term's distribution over the
/// training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntropyModel {
    global: Vec<f32>,
}

impl LogEntropyModel {
    /// Fit global weights from a training corpus of bag-of-words vectors.
    pub fn fit(corpus: &[SparseVec], num_terms: usize) -> Self {
        let mut global_freq = vec![0.0f64; num_terms];
        for bow in corpus {
            for &(id, tf) in bow {
                global_freq[id as usize] += f64::from(tf);
            }
        }

        let log_docs = (corpus.len() as f64).ln();
        let mut entropy = vec![0.0f64; num_terms];
        if log_docs > 0.0 {
            for bow in corpus {
                for &(id, tf) in bow {
                    let p = f64::from(tf) / global_freq[id as usize];
                    entropy[id as usize] += p * p.ln();
                }
            }
        }

        let global = entropy
            .into_iter()
            .map(|e| {
                if log_docs > 0.0 {
                    (1.0 + e / log_docs) as f32
                } else {
                    1.0
                }
            })
            .collect();

        Self { global }
    }

    pub fn global_weight(&self, id: u32) -> f32 {
        self.global.get(id as usize).copied().unwrap_or(0.0)
    }
}

impl TermWeighting for LogEntropyModel {
    fn weigh(&self, bow: &[(u32, f32)]) -> SparseVec {
        let weighted = bow
            .iter()
            .map(|&(id, tf)| (id, tf.ln_1p() * self.global_weight(id)))
            .filter(|&(_, w)| w != 0.0)
            .collect();
        normalize(weighted)
    }
}

/// Scale a sparse vector to unit length. Zero vectors are returned as-is.
pub fn normalize(mut vec: SparseVec) -> SparseVec {
    let norm = vec
        .iter()
        .map(|&(_, w)| f64::from(w) * f64::from(w))
        .sum::<f64>()
        .sqrt();

    if norm > 0.0 {
        for (_, w) in &mut vec {
            *w = (f64::from(*w) / norm) as f32;
        }
    }
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> Dictionary {
        let docs: Vec<Vec<String>> = vec![
            vec!["graph".into(), "trees".into()],
            vec!["graph".into(), "minors".into()],
            vec!["graph".into(), "minors".into(), "survey".into()],
            vec!["survey".into()],
        ];
        Dictionary::from_documents(docs.iter().map(Vec::as_slice))
    }

    #[test]
    fn test_idf_values() {
        let dict = dictionary();
        let tfidf = TfidfModel::fit(&dict);

        // graph: 3 of 4 docs, trees: 1 of 4 docs
        let graph = dict.id_of("graph").unwrap();
        let trees = dict.id_of("trees").unwrap();
        assert!((tfidf.idf(graph) - (4.0f32 / 3.0).log2()).abs() < 1e-6);
        assert!((tfidf.idf(trees) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_tfidf_is_normalized() {
        let dict = dictionary();
        let tfidf = TfidfModel::fit(&dict);
        let bow = dict.doc2bow(&["graph".to_string(), "trees".to_string()]);

        let weighted = tfidf.weigh(&bow);
        let norm: f32 = weighted.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tfidf_drops_terms_in_every_document() {
        let docs: Vec<Vec<String>> = vec![
            vec!["graph".into(), "trees".into()],
            vec!["graph".into()],
        ];
        let dict = Dictionary::from_documents(docs.iter().map(Vec::as_slice));
        let tfidf = TfidfModel::fit(&dict);

        let weighted = tfidf.weigh(&dict.doc2bow(&docs[1]));
        assert!(weighted.is_empty());
    }

    #[test]
    fn test_log_entropy_weights() {
        let dict = dictionary();
        let docs: Vec<Vec<String>> = vec![
            vec!["graph".into(), "trees".into()],
            vec!["graph".into(), "minors".into()],
            vec!["graph".into(), "minors".into(), "survey".into()],
            vec!["survey".into()],
        ];
        let corpus: Vec<SparseVec> = docs.iter().map(|d| dict.doc2bow(d)).collect();
        let model = LogEntropyModel::fit(&corpus, dict.len());

        // A term concentrated in one document carries full weight; a term
        // spread evenly carries less.
        let trees = dict.id_of("trees").unwrap();
        let graph = dict.id_of("graph").unwrap();
        assert!((model.global_weight(trees) - 1.0).abs() < 1e-6);
        assert!(model.global_weight(graph) < model.global_weight(trees));

        let weighted = model.weigh(&corpus[2]);
        let norm: f32 = weighted.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert!(normalize(Vec::new()).is_empty());
        assert_eq!(normalize(vec![(1, 0.0)]), vec![(1, 0.0)]);
    }
}
