//! Gaussian kernel matrices.
//!
//! The kernel matrix holds the pairwise affinities
//! `K[i, j] = exp(-‖xi − xj‖² / ε)` of a dataset. Squared distances are
//! accumulated as sums of squared component differences, so no square root is
//! taken and no cancellation-prone dot-product expansion is used; the optional
//! cut-off is compared against the squared distance for the same reason. The
//! upper triangle is computed once and mirrored, which makes the matrix
//! symmetric bit-for-bit.

mod inner;

pub use inner::{Inner, KernelInner};

use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::error::{DiffusionMapsError, Result};
use crate::Float;

/// A symmetric matrix of pairwise Gaussian affinities.
///
/// Dense when no cut-off was applied, sparse (CSR) otherwise. The diagonal is
/// always the self-affinity `exp(0) = 1`.
#[derive(Debug, Clone)]
pub struct KernelMatrix<F: Float> {
    pub(crate) inner: KernelInner<F>,
    epsilon: F,
}

impl<F: Float> KernelMatrix<F> {
    /// Build the kernel matrix of `data` with bandwidth `epsilon`.
    ///
    /// With a cut-off, entries whose distance exceeds it are dropped and the
    /// result is stored sparsely. Fails with
    /// [`DiffusionMapsError::InvalidBandwidth`] or
    /// [`DiffusionMapsError::InvalidCutoff`] before touching the data.
    pub fn build(data: &ArrayView2<F>, epsilon: F, cutoff: Option<F>) -> Result<Self> {
        if !(epsilon > F::zero()) || !epsilon.is_finite() {
            return Err(DiffusionMapsError::InvalidBandwidth(
                epsilon.to_f64().unwrap_or(f64::NAN),
            ));
        }
        if let Some(c) = cutoff {
            if !(c > F::zero()) || !c.is_finite() {
                return Err(DiffusionMapsError::InvalidCutoff(
                    c.to_f64().unwrap_or(f64::NAN),
                ));
            }
        }

        let inner = match cutoff {
            None => KernelInner::Dense(dense_gaussian(data, epsilon)),
            Some(c) => KernelInner::Sparse(sparse_gaussian(data, epsilon, c)),
        };

        let kernel = KernelMatrix { inner, epsilon };
        debug!(
            "built {} kernel: {} points, {} stored entries",
            if kernel.is_dense() { "dense" } else { "sparse" },
            kernel.size(),
            kernel.stored_entries(),
        );
        Ok(kernel)
    }

    /// The bandwidth this kernel was built with.
    pub fn epsilon(&self) -> F {
        self.epsilon
    }

    /// Side length of the square kernel matrix.
    pub fn size(&self) -> usize {
        match &self.inner {
            KernelInner::Dense(inn) => Inner::size(inn),
            KernelInner::Sparse(inn) => Inner::size(inn),
        }
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Array1<F> {
        match &self.inner {
            KernelInner::Dense(inn) => inn.row_sums(),
            KernelInner::Sparse(inn) => inn.row_sums(),
        }
    }

    /// Copy of the diagonal.
    pub fn diagonal(&self) -> Array1<F> {
        match &self.inner {
            KernelInner::Dense(inn) => Inner::diagonal(inn),
            KernelInner::Sparse(inn) => Inner::diagonal(inn),
        }
    }

    /// Affinity between points `i` and `j` (zero for dropped entries).
    pub fn get(&self, i: usize, j: usize) -> F {
        match &self.inner {
            KernelInner::Dense(inn) => Inner::get(inn, i, j),
            KernelInner::Sparse(inn) => Inner::get(inn, i, j),
        }
    }

    /// Dense copy of the matrix, whatever the storage.
    pub fn to_dense(&self) -> Array2<F> {
        match &self.inner {
            KernelInner::Dense(inn) => Inner::to_dense(inn),
            KernelInner::Sparse(inn) => Inner::to_dense(inn),
        }
    }

    /// Number of explicitly stored entries.
    pub fn stored_entries(&self) -> usize {
        match &self.inner {
            KernelInner::Dense(inn) => Inner::nnz(inn),
            KernelInner::Sparse(inn) => Inner::nnz(inn),
        }
    }

    /// Whether the matrix is stored densely.
    pub fn is_dense(&self) -> bool {
        matches!(self.inner, KernelInner::Dense(_))
    }

    /// The sparse representation, when a cut-off was applied.
    pub fn as_sparse(&self) -> Option<&CsMat<F>> {
        match &self.inner {
            KernelInner::Dense(_) => None,
            KernelInner::Sparse(inn) => Some(inn),
        }
    }
}

/// Squared Euclidean distance between two rows.
///
/// A sum of squares is non-negative by construction, so nearly identical
/// points cannot produce a spurious negative distance.
fn squared_distance<F: Float>(a: ArrayView1<F>, b: ArrayView1<F>) -> F {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - *y) * (*x - *y))
        .sum()
}

fn dense_gaussian<F: Float>(data: &ArrayView2<F>, epsilon: F) -> Array2<F> {
    let n = data.nrows();

    // strict upper triangle, one row per task
    let triangle: Vec<Vec<F>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i + 1..n)
                .map(|j| (-squared_distance(data.row(i), data.row(j)) / epsilon).exp())
                .collect()
        })
        .collect();

    // mirror into a dense matrix with unit diagonal
    let mut kernel = Array2::eye(n);
    for (i, row) in triangle.into_iter().enumerate() {
        for (offset, value) in row.into_iter().enumerate() {
            let j = i + 1 + offset;
            kernel[(i, j)] = value;
            kernel[(j, i)] = value;
        }
    }
    kernel
}

fn sparse_gaussian<F: Float>(data: &ArrayView2<F>, epsilon: F, cutoff: F) -> CsMat<F> {
    let n = data.nrows();
    let cutoff_sq = cutoff * cutoff;

    let triangle: Vec<Vec<(usize, F)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i + 1..n)
                .filter_map(|j| {
                    let d_sq = squared_distance(data.row(i), data.row(j));
                    if d_sq <= cutoff_sq {
                        Some((j, (-d_sq / epsilon).exp()))
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect();

    let mut triplets = TriMat::new((n, n));
    for i in 0..n {
        triplets.add_triplet(i, i, F::one());
    }
    for (i, row) in triangle.into_iter().enumerate() {
        for (j, value) in row {
            triplets.add_triplet(i, j, value);
            triplets.add_triplet(j, i, value);
        }
    }
    triplets.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn dataset(n: usize, d: usize) -> Array2<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(11);
        Array2::random_using((n, d), Uniform::new(-2.0, 2.0), &mut rng)
    }

    #[test]
    fn dense_kernel_is_exactly_symmetric() {
        let data = dataset(25, 4);
        let kernel = KernelMatrix::build(&data.view(), 1.3, None).unwrap();
        let k = kernel.to_dense();
        for i in 0..25 {
            for j in 0..25 {
                // bitwise equality, not approximate
                assert_eq!(k[(i, j)], k[(j, i)]);
            }
        }
    }

    #[test]
    fn sparse_kernel_is_exactly_symmetric() {
        let data = dataset(30, 3);
        let kernel = KernelMatrix::build(&data.view(), 1.0, Some(2.0)).unwrap();
        assert!(!kernel.is_dense());
        let k = kernel.to_dense();
        for i in 0..30 {
            for j in 0..30 {
                assert_eq!(k[(i, j)], k[(j, i)]);
            }
        }
    }

    #[test]
    fn diagonal_is_unit_self_affinity() {
        let data = dataset(12, 2);
        for cutoff in [None, Some(1.5)] {
            let kernel = KernelMatrix::build(&data.view(), 0.7, cutoff).unwrap();
            for value in kernel.diagonal() {
                assert_abs_diff_eq!(value, 1.0);
            }
        }
    }

    #[test]
    fn entries_match_the_gaussian_formula() {
        let data = dataset(10, 3);
        let epsilon = 0.9;
        let kernel = KernelMatrix::build(&data.view(), epsilon, None).unwrap();
        for i in 0..10 {
            for j in 0..10 {
                let d_sq = squared_distance(data.row(i), data.row(j));
                assert_abs_diff_eq!(kernel.get(i, j), (-d_sq / epsilon).exp(), epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn cutoff_drops_distant_pairs() {
        // two tight pairs far apart
        let data =
            Array2::from_shape_vec((4, 2), vec![0.0, 0.0, 0.1, 0.0, 9.0, 9.0, 9.1, 9.0]).unwrap();
        let kernel = KernelMatrix::build(&data.view(), 1.0, Some(1.0)).unwrap();
        assert!(kernel.get(0, 1) > 0.0);
        assert!(kernel.get(2, 3) > 0.0);
        assert_eq!(kernel.get(0, 2), 0.0);
        assert_eq!(kernel.get(1, 3), 0.0);
        // diagonal plus one neighbour each
        assert_eq!(kernel.stored_entries(), 8);
    }

    #[test]
    fn cutoff_below_minimum_distance_leaves_only_the_diagonal() {
        let data = dataset(8, 2);
        let kernel = KernelMatrix::build(&data.view(), 1.0, Some(1e-6)).unwrap();
        assert_eq!(kernel.stored_entries(), 8);
        let sums = kernel.row_sums();
        for s in sums {
            assert_abs_diff_eq!(s, 1.0);
        }
    }

    #[test]
    fn invalid_bandwidth_fails_before_any_work() {
        let data = dataset(5, 2);
        for eps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = KernelMatrix::build(&data.view(), eps, None).unwrap_err();
            assert!(matches!(err, DiffusionMapsError::InvalidBandwidth(_)));
        }
    }

    #[test]
    fn identical_points_give_an_all_ones_kernel() {
        let data = Array2::from_elem((6, 3), 0.5);
        let kernel = KernelMatrix::build(&data.view(), 0.1, None).unwrap();
        let k = kernel.to_dense();
        for value in k.iter() {
            assert_abs_diff_eq!(*value, 1.0);
        }
    }
}
