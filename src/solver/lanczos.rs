//! Lanczos tridiagonalization with full reorthogonalization.
//!
//! Krylov subspace reduction of a symmetric operator given only through its
//! matrix-vector product, so the same orchestration serves the CPU CSR path
//! and the GPU-backed product. Extremal eigenvalues converge first, which is
//! exactly what the diffusion-map embedding needs.

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use super::tridiag;
use crate::error::{DiffusionMapsError, Result};

/// Number of Krylov vectors kept for `k` requested eigenpairs on a problem of
/// size `n`. Generous oversampling keeps the extremal Ritz values accurate.
fn subspace_size(n: usize, k: usize) -> usize {
    n.min((4 * k + 60).max(2 * k))
}

/// The `k` largest-magnitude eigenpairs of a symmetric operator of size `n`.
///
/// `op` computes `y = A·x`; it may fail (the GPU product does on device
/// loss), and the failure propagates unchanged. On an invariant subspace
/// (Lanczos breakdown) the iteration restarts with a fresh random vector
/// orthogonalized against the basis, so degenerate spectra still fill `k`
/// pairs. Returns eigenvalues descending and the corresponding Ritz vectors
/// as columns.
pub fn largest_eigenpairs<Op>(
    n: usize,
    k: usize,
    mut op: Op,
) -> Result<(Vec<f64>, Array2<f64>)>
where
    Op: FnMut(&[f64], &mut [f64]) -> Result<()>,
{
    if k == 0 || k > n {
        return Err(DiffusionMapsError::InvalidEigenpairCount {
            requested: k,
            size: n,
        });
    }

    let m = subspace_size(n, k);
    let mut rng = Xoshiro256Plus::seed_from_u64(42);

    let mut v = random_unit_vector(n, &mut rng);
    let mut alpha = Vec::with_capacity(m);
    let mut beta = Vec::with_capacity(m);

    // all Lanczos vectors are kept for full reorthogonalization
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(m);
    basis.push(v.clone());

    let mut v_prev = vec![0.0; n];
    let mut beta_prev = 0.0;
    let mut w = vec![0.0; n];
    let mut restarts = 0;

    for _ in 0..m {
        op(&v, &mut w)?;

        if beta_prev != 0.0 {
            for i in 0..n {
                w[i] -= beta_prev * v_prev[i];
            }
        }

        let a_j = tridiag::dot(&w, &v);
        alpha.push(a_j);

        for i in 0..n {
            w[i] -= a_j * v[i];
        }

        // Gram-Schmidt against every stored vector
        for prev in &basis {
            let proj = tridiag::dot(&w, prev);
            for i in 0..n {
                w[i] -= proj * prev[i];
            }
        }

        if alpha.len() == m {
            break;
        }

        let b_next = tridiag::dot(&w, &w).sqrt();
        if b_next < 1e-12 {
            // invariant subspace: restart with a fresh direction
            restarts += 1;
            if restarts > n {
                return Err(DiffusionMapsError::EigenSolver(format!(
                    "Lanczos could not extend the Krylov basis past {} vectors",
                    basis.len()
                )));
            }
            beta.push(0.0);
            let mut fresh = random_unit_vector(n, &mut rng);
            for prev in &basis {
                let proj = tridiag::dot(&fresh, prev);
                for i in 0..n {
                    fresh[i] -= proj * prev[i];
                }
            }
            let norm = tridiag::dot(&fresh, &fresh).sqrt();
            if norm < 1e-12 {
                return Err(DiffusionMapsError::EigenSolver(
                    "no direction left to restart the Krylov basis".into(),
                ));
            }
            for x in fresh.iter_mut() {
                *x /= norm;
            }
            v_prev.copy_from_slice(&v);
            beta_prev = 0.0;
            v = fresh;
        } else {
            beta.push(b_next);
            v_prev.copy_from_slice(&v);
            beta_prev = b_next;
            for i in 0..n {
                v[i] = w[i] / b_next;
            }
        }
        basis.push(v.clone());
    }

    let steps = alpha.len();
    if steps < k {
        return Err(DiffusionMapsError::EigenSolver(format!(
            "Krylov subspace of dimension {} cannot hold {} eigenpairs",
            steps, k
        )));
    }

    let off_diag = &beta[..steps - 1];
    let (vals, tvecs) = tridiag::largest_eigenpairs(&alpha, off_diag, k);

    // Ritz vectors: columns of V_m * S
    let mut vecs = Array2::zeros((n, vals.len()));
    for (col, s) in tvecs.iter().enumerate() {
        for (j, weight) in s.iter().enumerate() {
            let basis_vec = &basis[j];
            for i in 0..n {
                vecs[(i, col)] += weight * basis_vec[i];
            }
        }
    }

    Ok((vals, vecs))
}

fn random_unit_vector<R: Rng>(n: usize, rng: &mut R) -> Vec<f64> {
    let mut v: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
    tridiag::normalize(&mut v);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov::CsrOperator;

    // dense symmetric matrix wrapped as a fully populated CSR
    fn csr_from_dense(a: &[&[f64]]) -> CsrOperator {
        let n = a.len();
        let mut row_ptr = vec![0usize];
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        for row in a {
            for (j, v) in row.iter().enumerate() {
                col_idx.push(j);
                values.push(*v);
            }
            row_ptr.push(col_idx.len());
        }
        CsrOperator {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    #[test]
    fn recovers_a_known_spectrum() {
        // eigenvalues 3 and 1 (vectors along (1,1)/(1,-1))
        let mat = csr_from_dense(&[&[2.0, 1.0], &[1.0, 2.0]]);
        let (vals, vecs) = largest_eigenpairs(2, 2, |x, y| {
            mat.spmv(x, y);
            Ok(())
        })
        .unwrap();
        assert!((vals[0] - 3.0).abs() < 1e-10);
        assert!((vals[1] - 1.0).abs() < 1e-10);
        assert!((vecs[(0, 0)] - vecs[(1, 0)]).abs() < 1e-8);
        assert!((vecs[(0, 1)] + vecs[(1, 1)]).abs() < 1e-8);
    }

    #[test]
    fn identity_operator_restarts_through_breakdown() {
        let n = 10;
        let (vals, vecs) = largest_eigenpairs(n, 4, |x, y| {
            y.copy_from_slice(x);
            Ok(())
        })
        .unwrap();
        for v in &vals {
            assert!((v - 1.0).abs() < 1e-10);
        }
        // distinct eigenpairs of a degenerate spectrum stay orthogonal
        for i in 0..4 {
            for j in 0..i {
                let d: f64 = (0..n).map(|r| vecs[(r, i)] * vecs[(r, j)]).sum();
                assert!(d.abs() < 1e-8);
            }
        }
    }

    #[test]
    fn operator_errors_propagate() {
        let err = largest_eigenpairs(5, 2, |_, _| {
            Err(DiffusionMapsError::EigenSolver("device lost".into()))
        })
        .unwrap_err();
        assert!(matches!(err, DiffusionMapsError::EigenSolver(_)));
    }

    #[test]
    fn rejects_more_pairs_than_the_operator_size() {
        let err = largest_eigenpairs(3, 4, |x: &[f64], y: &mut [f64]| {
            y.copy_from_slice(x);
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            DiffusionMapsError::InvalidEigenpairCount { .. }
        ));
    }
}
