//! Symmetric tridiagonal eigenproblems.
//!
//! The Lanczos path reduces the diffusion operator to a tridiagonal matrix
//! `T`; its eigenvalues are found by Sturm bisection and its eigenvectors by
//! inverse iteration with a regularized tridiagonal solve. Eigenvectors of
//! near-degenerate eigenvalues are re-orthogonalized against each other, as
//! inverse iteration alone does not separate a degenerate cluster.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Count eigenvalues of a symmetric tridiagonal matrix strictly below
/// `lambda`, via the Sturm sequence of the LDLᵀ factorization: the number of
/// negative pivots equals the number of eigenvalues below the shift.
///
/// - `diagonal`: main diagonal `d[0..n]`
/// - `off_diag`: sub/super-diagonal `e[0..n-1]`
pub fn sturm_count(diagonal: &[f64], off_diag: &[f64], lambda: f64) -> usize {
    let n = diagonal.len();
    if n == 0 {
        return 0;
    }

    let mut count = 0;
    let mut q = diagonal[0] - lambda;
    if q < 0.0 {
        count += 1;
    }

    for i in 1..n {
        let q_safe = if q.abs() < 1e-300 {
            if q >= 0.0 {
                1e-300
            } else {
                -1e-300
            }
        } else {
            q
        };
        q = (diagonal[i] - lambda) - off_diag[i - 1] * off_diag[i - 1] / q_safe;
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// All eigenvalues of a symmetric tridiagonal matrix, ascending, via Sturm
/// bisection inside the Gershgorin interval.
pub fn eigenvalues(diagonal: &[f64], off_diag: &[f64]) -> Vec<f64> {
    let n = diagonal.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![diagonal[0]];
    }

    // Gershgorin bounds
    let mut lo = f64::MAX;
    let mut hi = f64::MIN;
    for i in 0..n {
        let e_left = if i > 0 { off_diag[i - 1].abs() } else { 0.0 };
        let e_right = if i < n - 1 { off_diag[i].abs() } else { 0.0 };
        lo = lo.min(diagonal[i] - e_left - e_right);
        hi = hi.max(diagonal[i] + e_left + e_right);
    }
    lo -= 1.0;
    hi += 1.0;

    let mut eigvals = Vec::with_capacity(n);
    for k in 0..n {
        let mut a = lo;
        let mut b = hi;
        // bisect until the k-th eigenvalue is bracketed to machine width
        while b - a > 1e-14 * (b.abs() + a.abs() + 1.0) {
            let mid = 0.5 * (a + b);
            if sturm_count(diagonal, off_diag, mid) <= k {
                a = mid;
            } else {
                b = mid;
            }
        }
        eigvals.push(0.5 * (a + b));
    }
    eigvals
}

/// Eigenvector of the tridiagonal matrix for the eigenvalue `lambda`, by two
/// rounds of inverse iteration with a regularized Thomas solve.
///
/// The start vector must be independent of the starts used for the other
/// vectors of a degenerate cluster, otherwise the cluster orthogonalization
/// has nothing left to work with; hence the RNG.
fn eigenvector<R: Rng>(diagonal: &[f64], off_diag: &[f64], lambda: f64, rng: &mut R) -> Vec<f64> {
    let n = diagonal.len();
    let mut x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
    normalize(&mut x);

    for _ in 0..2 {
        x = solve_shifted(diagonal, off_diag, lambda, &x);
        normalize(&mut x);
    }
    x
}

/// Solve `(T - lambda I) y = b` by LU without pivoting; tiny pivots are
/// replaced so a singular shift (lambda equal to an eigenvalue) amplifies the
/// eigenvector direction instead of dividing by zero.
fn solve_shifted(diagonal: &[f64], off_diag: &[f64], lambda: f64, b: &[f64]) -> Vec<f64> {
    let n = diagonal.len();
    let mut c = vec![0.0; n]; // super-diagonal after elimination
    let mut d = vec![0.0; n]; // rhs after elimination

    let pivot = |p: f64| {
        if p.abs() < 1e-12 {
            if p >= 0.0 {
                1e-12
            } else {
                -1e-12
            }
        } else {
            p
        }
    };

    let mut denom = pivot(diagonal[0] - lambda);
    if n > 1 {
        c[0] = off_diag[0] / denom;
    }
    d[0] = b[0] / denom;
    for i in 1..n {
        denom = pivot(diagonal[i] - lambda - off_diag[i - 1] * c[i - 1]);
        if i < n - 1 {
            c[i] = off_diag[i] / denom;
        }
        d[i] = (b[i] - off_diag[i - 1] * d[i - 1]) / denom;
    }

    let mut y = vec![0.0; n];
    y[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        y[i] = d[i] - c[i] * y[i + 1];
    }
    y
}

/// The `k` largest-magnitude eigenpairs of a symmetric tridiagonal matrix,
/// ordered by descending `|lambda|` with ties broken on descending value.
///
/// Eigenvectors inside a cluster of near-equal eigenvalues are orthogonalized
/// against the vectors already produced for that cluster; a start vector that
/// loses nearly everything to that projection is discarded and the inverse
/// iteration rerun from a fresh random start.
pub fn largest_eigenpairs(
    diagonal: &[f64],
    off_diag: &[f64],
    k: usize,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = diagonal.len();
    let all = eigenvalues(diagonal, off_diag);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        all[b]
            .abs()
            .partial_cmp(&all[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                all[b]
                    .partial_cmp(&all[a])
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    let take = k.min(n);

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let mut vals: Vec<f64> = Vec::with_capacity(take);
    let mut vecs: Vec<Vec<f64>> = Vec::with_capacity(take);
    for &pos in order.iter().take(take) {
        let lambda = all[pos];
        let mut v = Vec::new();
        for _ in 0..MAX_STARTS {
            v = eigenvector(diagonal, off_diag, lambda, &mut rng);
            // separate degenerate clusters
            for (prev_val, prev_vec) in vals.iter().zip(vecs.iter()) {
                if (lambda - *prev_val).abs() < 1e-8 {
                    let proj = dot(&v, prev_vec);
                    for (vi, pi) in v.iter_mut().zip(prev_vec.iter()) {
                        *vi -= proj * pi;
                    }
                }
            }
            if dot(&v, &v).sqrt() > 1e-6 {
                break;
            }
        }
        normalize(&mut v);
        vals.push(lambda);
        vecs.push(v);
    }
    (vals, vecs)
}

const MAX_STARTS: usize = 4;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub(crate) fn normalize(v: &mut [f64]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1D Laplacian-like matrix with known spectrum 2 - 2cos(pi j / (n+1))
    fn toeplitz(n: usize) -> (Vec<f64>, Vec<f64>) {
        (vec![2.0; n], vec![-1.0; n - 1])
    }

    #[test]
    fn sturm_counts_bracket_the_spectrum() {
        let (d, e) = toeplitz(8);
        assert_eq!(sturm_count(&d, &e, -0.1), 0);
        assert_eq!(sturm_count(&d, &e, 4.1), 8);
    }

    #[test]
    fn eigenvalues_match_the_analytic_toeplitz_spectrum() {
        let n = 16;
        let (d, e) = toeplitz(n);
        let computed = eigenvalues(&d, &e);
        let pi = std::f64::consts::PI;
        for (j, value) in computed.iter().enumerate() {
            let expected = 2.0 - 2.0 * (pi * (j + 1) as f64 / (n + 1) as f64).cos();
            assert!(
                (value - expected).abs() < 1e-10,
                "eigenvalue {}: {} vs {}",
                j,
                value,
                expected
            );
        }
    }

    #[test]
    fn eigenpairs_satisfy_the_eigen_equation() {
        let n = 12;
        let (d, e) = toeplitz(n);
        let (vals, vecs) = largest_eigenpairs(&d, &e, 4);
        assert_eq!(vals.len(), 4);
        for (lambda, v) in vals.iter().zip(vecs.iter()) {
            for i in 0..n {
                let mut t_v = d[i] * v[i];
                if i > 0 {
                    t_v += e[i - 1] * v[i - 1];
                }
                if i < n - 1 {
                    t_v += e[i] * v[i + 1];
                }
                assert!(
                    (t_v - lambda * v[i]).abs() < 1e-8,
                    "residual too large at row {}",
                    i
                );
            }
        }
    }

    #[test]
    fn degenerate_diagonal_yields_orthogonal_vectors() {
        // identity-like: all eigenvalues equal, cluster of multiplicity 8
        let d = vec![1.0; 8];
        let e = vec![0.0; 7];
        let (vals, vecs) = largest_eigenpairs(&d, &e, 6);
        for v in &vals {
            assert!((v - 1.0).abs() < 1e-12);
        }
        for i in 0..6 {
            assert!((dot(&vecs[i], &vecs[i]) - 1.0).abs() < 1e-10);
            for j in 0..i {
                assert!(
                    dot(&vecs[i], &vecs[j]).abs() < 1e-8,
                    "vectors {} and {} are not orthogonal",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn selection_ranks_by_magnitude_not_value() {
        // diagonal matrix with spectrum {-2.5, 0.5, 2.0}
        let d = vec![2.0, -2.5, 0.5];
        let e = vec![0.0, 0.0];
        let (vals, _) = largest_eigenpairs(&d, &e, 2);
        assert!((vals[0] + 2.5).abs() < 1e-12);
        assert!((vals[1] - 2.0).abs() < 1e-12);
    }
}
