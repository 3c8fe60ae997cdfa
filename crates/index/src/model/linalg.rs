//! Dense symmetric eigen-decomposition (cyclic Jacobi).

/// Sweeps before giving up on convergence.
const MAX_SWEEPS: usize = 100;

/// Relative off-diagonal mass at which the matrix counts as diagonal.
const CONVERGENCE: f64 = 1e-24;

/// One eigenvalue with its unit eigenvector.
#[derive(Debug, Clone)]
pub struct EigenPair {
    pub value: f64,
    pub vector: Vec<f64>,
}

/// Eigen-decompose a symmetric matrix given as rows.
///
/// Returns all eigenpairs sorted by descending eigenvalue. Only the upper
/// triangle is assumed symmetric with the lower one; asymmetric input gives
/// meaningless results.
pub fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> Vec<EigenPair> {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect();

    let total: f64 = a.iter().flatten().map(|x| x * x).sum();

    for sweep in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();

        if off <= CONVERGENCE * total {
            tracing::trace!("Jacobi converged after {} sweeps (n={})", sweep, n);
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- A * P
                for row in a.iter_mut() {
                    let akp = row[p];
                    let akq = row[q];
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }

                // A <- P^T * A
                for k in 0..n {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }

                // V <- V * P
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut pairs: Vec<EigenPair> = (0..n)
        .map(|k| EigenPair {
            value: a[k][k],
            vector: v.iter().map(|row| row[k]).collect(),
        })
        .collect();

    pairs.sort_by(|x, y| y.value.total_cmp(&x.value));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_diagonal_matrix() {
        let pairs = symmetric_eigen(vec![vec![1.0, 0.0], vec![0.0, 3.0]]);
        assert_close(pairs[0].value, 3.0);
        assert_close(pairs[1].value, 1.0);
        assert_close(pairs[0].vector[1].abs(), 1.0);
    }

    #[test]
    fn test_two_by_two() {
        // eigenvalues 3 and 1, eigenvectors (1,1)/sqrt2 and (1,-1)/sqrt2
        let pairs = symmetric_eigen(vec![vec![2.0, 1.0], vec![1.0, 2.0]]);
        assert_close(pairs[0].value, 3.0);
        assert_close(pairs[1].value, 1.0);

        let v = &pairs[0].vector;
        assert_close(v[0].abs(), std::f64::consts::FRAC_1_SQRT_2);
        assert_close(v[0], v[1]);
    }

    #[test]
    fn test_reconstruction() {
        let m = vec![
            vec![4.0, 1.0, 2.0],
            vec![1.0, 3.0, 0.5],
            vec![2.0, 0.5, 5.0],
        ];
        let pairs = symmetric_eigen(m.clone());

        // M v = lambda v for every pair
        for pair in &pairs {
            for i in 0..3 {
                let mv: f64 = (0..3).map(|j| m[i][j] * pair.vector[j]).sum();
                assert_close(mv, pair.value * pair.vector[i]);
            }
        }

        let trace: f64 = pairs.iter().map(|p| p.value).sum();
        assert_close(trace, 12.0);
    }

    #[test]
    fn test_empty_matrix() {
        assert!(symmetric_eigen(Vec::new()).is_empty());
    }
}
