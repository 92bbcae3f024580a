//! Dense symmetric eigendecomposition.

use ndarray::Array2;

use linfa_linalg::eigh::EighInto;

use crate::error::{DiffusionMapsError, Result};

/// The `k` largest-magnitude eigenpairs of a dense symmetric matrix,
/// ordered by descending `|lambda|` with ties broken on descending value.
///
/// Full decomposition, then the `k` columns of largest magnitude. The
/// operator is not positive semidefinite in general (a truncated kernel is
/// not), so selecting by value would miss large negative eigenvalues.
/// Intended for operators small enough that a complete solve is cheaper
/// than an iterative one.
pub fn largest_eigenpairs(a: Array2<f64>, k: usize) -> Result<(Vec<f64>, Array2<f64>)> {
    let n = a.nrows();
    if k == 0 || k > n {
        return Err(DiffusionMapsError::InvalidEigenpairCount {
            requested: k,
            size: n,
        });
    }

    let (vals, vecs) = a.eigh_into()?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        vals[b]
            .abs()
            .partial_cmp(&vals[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                vals[b]
                    .partial_cmp(&vals[a])
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let top_vals: Vec<f64> = order.iter().take(k).map(|&i| vals[i]).collect();
    let mut top_vecs = Array2::zeros((n, k));
    for (dst, &src) in order.iter().take(k).enumerate() {
        top_vecs.column_mut(dst).assign(&vecs.column(src));
    }
    Ok((top_vals, top_vecs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn matches_the_analytic_two_by_two() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (vals, vecs) = largest_eigenpairs(a, 2).unwrap();
        assert!((vals[0] - 3.0).abs() < 1e-12);
        assert!((vals[1] - 1.0).abs() < 1e-12);
        assert!((vecs[(0, 0)] - vecs[(1, 0)]).abs() < 1e-10);
        assert!((vecs[(0, 1)] + vecs[(1, 1)]).abs() < 1e-10);
    }

    #[test]
    fn truncates_to_the_requested_count() {
        let a = array![[4.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let (vals, vecs) = largest_eigenpairs(a, 2).unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vecs.dim(), (3, 2));
        assert!((vals[0] - 4.0).abs() < 1e-12);
        assert!((vals[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn selection_ranks_by_magnitude_not_value() {
        // spectrum {-3.0, 0.5, 2.0}: the negative extreme outranks both
        let a = array![[-3.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 2.0]];
        let (vals, vecs) = largest_eigenpairs(a, 2).unwrap();
        assert!((vals[0] + 3.0).abs() < 1e-12);
        assert!((vals[1] - 2.0).abs() < 1e-12);
        assert!(vecs[(0, 0)].abs() > 0.99);
        assert!(vecs[(2, 1)].abs() > 0.99);
    }

    #[test]
    fn rejects_out_of_range_counts() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        assert!(largest_eigenpairs(a.clone(), 0).is_err());
        assert!(largest_eigenpairs(a, 3).is_err());
    }
}
