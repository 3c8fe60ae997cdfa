//! Latent semantic indexing: truncated SVD of the weighted term-document
//! matrix.
//!
//! The SVD is obtained from the eigen-decomposition of whichever Gram matrix
//! is smaller: `AᵀA` (documents × documents) or `AAᵀ` (terms × terms). Both
//! give the same left singular vectors `U`, which form the projection.

use serde::{Deserialize, Serialize};

use super::dictionary::SparseVec;
use super::linalg::symmetric_eigen;

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// A fitted LSI projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsiModel {
    num_terms: usize,

    /// Singular values, descending
    singular_values: Vec<f32>,

    /// Left singular vectors, one row of `num_terms` weights per topic
    projection: Vec<Vec<f32>>,
}

impl LsiModel {
    /// Fit a projection with at most `num_topics` topics.
    ///
    /// `corpus` holds one weighted sparse vector per training document. The
    /// number of topics actually kept is bounded by the numerical rank of the
    /// term-document matrix.
    pub fn fit(corpus: &[SparseVec], num_terms: usize, num_topics: usize) -> Self {
        let num_docs = corpus.len();

        let topics = if num_docs <= num_terms {
            Self::topics_from_doc_gram(corpus, num_terms)
        } else {
            Self::topics_from_term_gram(corpus, num_terms)
        };

        let largest = topics.first().map(|(sigma, _)| *sigma).unwrap_or(0.0);
        let (singular_values, projection): (Vec<f32>, Vec<Vec<f32>>) = topics
            .into_iter()
            .take_while(|(sigma, _)| *sigma > 0.0 && *sigma > largest * RANK_TOLERANCE)
            .take(num_topics)
            .map(|(sigma, u)| (sigma as f32, u.into_iter().map(|x| x as f32).collect()))
            .unzip();

        tracing::debug!(
            "Fitted LSI over {} documents x {} terms: kept {} of {} requested topics",
            num_docs,
            num_terms,
            singular_values.len(),
            num_topics
        );

        Self {
            num_terms,
            singular_values,
            projection,
        }
    }

    /// Eigen-decompose `AᵀA`; recover `u = A v / sigma`.
    fn topics_from_doc_gram(corpus: &[SparseVec], num_terms: usize) -> Vec<(f64, Vec<f64>)> {
        let n = corpus.len();
        let mut gram = vec![vec![0.0f64; n]; n];
        for i in 0..n {
            for j in i..n {
                let dot = sparse_dot(&corpus[i], &corpus[j]);
                gram[i][j] = dot;
                gram[j][i] = dot;
            }
        }

        symmetric_eigen(gram)
            .into_iter()
            .filter(|pair| pair.value > 0.0)
            .map(|pair| {
                let sigma = pair.value.sqrt();
                let mut u = vec![0.0f64; num_terms];
                for (doc, &coeff) in corpus.iter().zip(&pair.vector) {
                    for &(id, w) in doc {
                        u[id as usize] += coeff * f64::from(w) / sigma;
                    }
                }
                (sigma, u)
            })
            .collect()
    }

    /// Eigen-decompose `AAᵀ`; its eigenvectors are `u` directly.
    fn topics_from_term_gram(corpus: &[SparseVec], num_terms: usize) -> Vec<(f64, Vec<f64>)> {
        let mut gram = vec![vec![0.0f64; num_terms]; num_terms];
        for doc in corpus {
            for &(a, wa) in doc {
                for &(b, wb) in doc {
                    gram[a as usize][b as usize] += f64::from(wa) * f64::from(wb);
                }
            }
        }

        symmetric_eigen(gram)
            .into_iter()
            .filter(|pair| pair.value > 0.0)
            .map(|pair| (pair.value.sqrt(), pair.vector))
            .collect()
    }

    /// Project a weighted sparse vector into topic space.
    pub fn project(&self, vec: &[(u32, f32)]) -> Vec<f32> {
        self.projection
            .iter()
            .map(|u| {
                vec.iter()
                    .filter_map(|&(id, w)| u.get(id as usize).map(|&x| f64::from(x) * f64::from(w)))
                    .sum::<f64>() as f32
            })
            .collect()
    }

    pub fn num_topics(&self) -> usize {
        self.projection.len()
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    pub fn singular_values(&self) -> &[f32] {
        &self.singular_values
    }
}

/// Dot product of two id-sorted sparse vectors.
fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0f64;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += f64::from(a[i].1) * f64::from(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<SparseVec> {
        vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(1, 1.0), (2, 1.0)],
            vec![(3, 1.0)],
        ]
    }

    fn dense_dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_sparse_dot() {
        assert_eq!(sparse_dot(&[(0, 2.0), (3, 1.0)], &[(3, 4.0), (5, 1.0)]), 4.0);
        assert_eq!(sparse_dot(&[], &[(1, 1.0)]), 0.0);
    }

    #[test]
    fn test_singular_values_descending() {
        let lsi = LsiModel::fit(&corpus(), 4, 10);
        assert_eq!(lsi.num_topics(), 3);
        let s = lsi.singular_values();
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
        // The isolated term gives a singular value of exactly 1
        assert!(s.iter().any(|&x| (x - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_num_topics_truncates() {
        let lsi = LsiModel::fit(&corpus(), 4, 2);
        assert_eq!(lsi.num_topics(), 2);
    }

    #[test]
    fn test_full_rank_projection_preserves_dot_products() {
        // With every topic kept, U is an orthonormal basis of the column
        // space, so projecting corpus documents preserves inner products.
        let docs = corpus();
        let lsi = LsiModel::fit(&docs, 4, 10);
        let projected: Vec<Vec<f32>> = docs.iter().map(|d| lsi.project(d)).collect();

        for i in 0..docs.len() {
            for j in 0..docs.len() {
                let expected = sparse_dot(&docs[i], &docs[j]) as f32;
                assert!((dense_dot(&projected[i], &projected[j]) - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_term_gram_path_matches_doc_gram_path() {
        // More documents than terms takes the AAᵀ path
        let docs: Vec<SparseVec> = vec![
            vec![(0, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
            vec![(1, 2.0)],
            vec![(0, 0.5), (1, 0.5)],
        ];
        let lsi = LsiModel::fit(&docs, 2, 10);
        assert_eq!(lsi.num_topics(), 2);

        let projected: Vec<Vec<f32>> = docs.iter().map(|d| lsi.project(d)).collect();
        let expected = sparse_dot(&docs[1], &docs[2]) as f32;
        assert!((dense_dot(&projected[1], &projected[2]) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_project_ignores_unknown_terms() {
        let lsi = LsiModel::fit(&corpus(), 4, 10);
        let projected = lsi.project(&[(99, 1.0)]);
        assert!(projected.iter().all(|&x| x == 0.0));
    }
}
