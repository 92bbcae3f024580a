//! Row-stochastic normalization of the kernel matrix.
//!
//! Dividing each row of the kernel matrix `K` by its sum yields the Markov
//! transition operator `P = D⁻¹K` of a random walk on the data. `P` is not
//! symmetric, but it is similar to the symmetric conjugate
//! `A = D^{-1/2} K D^{-1/2}`: both share the same real spectrum, and an
//! eigenvector `v` of `A` maps to the eigenvector `D^{-1/2} v` of `P`. The
//! eigensolvers therefore always work on `A` and the results are rescaled
//! afterwards.

use ndarray::prelude::*;
use sprs::CsMat;

use crate::error::{DiffusionMapsError, Result};
use crate::kernel::{KernelInner, KernelMatrix};
use crate::Float;

/// The diffusion operator derived from a kernel matrix.
///
/// Owns the kernel together with its row sums; created fresh per computation
/// and immutable afterwards.
pub struct DiffusionOperator<F: Float> {
    kernel: KernelMatrix<F>,
    row_sums: Array1<F>,
    inv_sqrt_row_sums: Array1<F>,
}

impl<F: Float> DiffusionOperator<F> {
    /// Normalize `kernel` into a diffusion operator.
    ///
    /// Fails with [`DiffusionMapsError::DegenerateRow`] if any row sums to
    /// zero, i.e. a point with no affinity to any other point including
    /// itself. With a Gaussian kernel this can only happen for pathological
    /// bandwidth or cut-off choices.
    pub fn normalize(kernel: KernelMatrix<F>) -> Result<Self> {
        let row_sums = kernel.row_sums();
        for (i, sum) in row_sums.iter().enumerate() {
            if *sum == F::zero() {
                return Err(DiffusionMapsError::DegenerateRow(i));
            }
        }
        let inv_sqrt_row_sums = row_sums.mapv(|x| x.sqrt().recip());

        Ok(DiffusionOperator {
            kernel,
            row_sums,
            inv_sqrt_row_sums,
        })
    }

    /// Number of points the operator acts on.
    pub fn size(&self) -> usize {
        self.kernel.size()
    }

    /// Whether the underlying kernel is stored densely.
    pub fn is_dense(&self) -> bool {
        self.kernel.is_dense()
    }

    /// Row sums of the kernel matrix (the degrees `d`).
    pub fn row_sums(&self) -> &Array1<F> {
        &self.row_sums
    }

    /// The dense transition matrix `P = D⁻¹K`.
    ///
    /// Every row sums to one; the matrix is generally asymmetric. Intended
    /// for inspection and small problems; the solvers use the symmetric
    /// conjugate instead.
    pub fn transition_matrix(&self) -> Array2<F> {
        let mut p = self.kernel.to_dense();
        for (mut row, sum) in p.rows_mut().into_iter().zip(self.row_sums.iter()) {
            row.mapv_inplace(|x| x / *sum);
        }
        p
    }

    /// The dense symmetric conjugate `A = D^{-1/2} K D^{-1/2}`.
    pub fn symmetric_conjugate(&self) -> Array2<F> {
        let mut a = self.kernel.to_dense();
        for ((i, j), value) in a.indexed_iter_mut() {
            *value = *value * self.inv_sqrt_row_sums[i] * self.inv_sqrt_row_sums[j];
        }
        a
    }

    /// The symmetric conjugate in CSR form, in f64 for the iterative solvers.
    pub fn symmetric_conjugate_csr(&self) -> CsrOperator {
        let n = self.size();
        let scale = |i: usize, j: usize, v: F| {
            (v * self.inv_sqrt_row_sums[i] * self.inv_sqrt_row_sums[j])
                .to_f64()
                .unwrap_or(0.0)
        };

        match &self.kernel.inner {
            KernelInner::Sparse(csmat) => {
                let mut row_ptr = Vec::with_capacity(n + 1);
                row_ptr.push(0usize);
                let mut col_idx = Vec::with_capacity(csmat.nnz());
                let mut values = Vec::with_capacity(csmat.nnz());
                for (i, row) in csmat.outer_iterator().enumerate() {
                    for (j, v) in row.iter() {
                        col_idx.push(j);
                        values.push(scale(i, j, *v));
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
            KernelInner::Dense(dense) => {
                // a dense kernel is a fully populated CSR
                let mut row_ptr = Vec::with_capacity(n + 1);
                row_ptr.push(0usize);
                let mut col_idx = Vec::with_capacity(n * n);
                let mut values = Vec::with_capacity(n * n);
                for (i, row) in dense.rows().into_iter().enumerate() {
                    for (j, v) in row.iter().enumerate() {
                        col_idx.push(j);
                        values.push(scale(i, j, *v));
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
        }
    }

    /// Map eigenvectors of the symmetric conjugate back to eigenvectors of
    /// the transition matrix and normalize each to unit length.
    pub fn scale_eigenvectors(&self, mut vecs: Array2<F>) -> Array2<F> {
        for (mut row, scale) in vecs.rows_mut().into_iter().zip(self.inv_sqrt_row_sums.iter()) {
            row.mapv_inplace(|x| x * *scale);
        }
        for mut col in vecs.columns_mut() {
            let norm = col.iter().map(|x| *x * *x).sum::<F>().sqrt();
            if norm > F::zero() {
                col.mapv_inplace(|x| x / norm);
            }
        }
        vecs
    }

    /// Give the kernel matrix back for the result bundle.
    pub fn into_kernel(self) -> KernelMatrix<F> {
        self.kernel
    }
}

/// A CSR matrix in plain `f64` arrays, the common operand of the sparse CPU
/// and the accelerated eigensolver paths.
#[derive(Debug, Clone)]
pub struct CsrOperator {
    pub n: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrOperator {
    /// Sparse matrix-vector product `y = A·x`.
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *yi = sum;
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
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

    fn operator(n: usize, cutoff: Option<f64>) -> DiffusionOperator<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let data = Array2::random_using((n, 3), Uniform::new(-1.0, 1.0), &mut rng);
        let kernel = KernelMatrix::build(&data.view(), 1.0, cutoff).unwrap();
        DiffusionOperator::normalize(kernel).unwrap()
    }

    #[test]
    fn transition_rows_sum_to_one() {
        for cutoff in [None, Some(1.5)] {
            let op = operator(20, cutoff);
            let p = op.transition_matrix();
            for row in p.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn symmetric_conjugate_is_symmetric() {
        let op = operator(15, None);
        let a = op.symmetric_conjugate();
        for i in 0..15 {
            for j in 0..15 {
                assert_abs_diff_eq!(a[(i, j)], a[(j, i)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn conjugate_csr_matches_dense_conjugate() {
        for cutoff in [None, Some(1.2)] {
            let op = operator(12, cutoff);
            let dense = op.symmetric_conjugate();
            let csr = op.symmetric_conjugate_csr();
            let x: Vec<f64> = (0..12).map(|i| (i as f64).sin()).collect();
            let mut y = vec![0.0; 12];
            csr.spmv(&x, &mut y);
            let xd = Array1::from(x);
            let yd = dense.dot(&xd);
            for i in 0..12 {
                assert_abs_diff_eq!(y[i], yd[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn identical_points_give_uniform_transitions() {
        let data = Array2::from_elem((8, 2), 1.0);
        let kernel = KernelMatrix::build(&data.view(), 0.5, None).unwrap();
        let op = DiffusionOperator::normalize(kernel).unwrap();
        let p = op.transition_matrix();
        for value in p.iter() {
            assert_abs_diff_eq!(*value, 1.0 / 8.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn tight_cutoff_gives_identity_transitions() {
        let op = operator(10, Some(1e-9));
        let p = op.transition_matrix();
        for i in 0..10 {
            for j in 0..10 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(p[(i, j)], expected);
            }
        }
    }
}
