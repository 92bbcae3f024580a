//! Eigensolver backends for the normalized diffusion operator.
//!
//! Three strategies cover the practical regimes: a full dense symmetric
//! decomposition for small or fully populated operators, Lanczos over the
//! CSR product for large sparse ones, and the same Lanczos driven by an
//! accelerator-resident product when a capable device is present. All of
//! them work on the symmetric conjugate of the Markov operator, so the
//! spectra are real; eigenvalues are still carried as (re, im) pairs and
//! ordered by descending magnitude.

use ndarray::Array2;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::Result;
use crate::markov::DiffusionOperator;
use crate::Float;

mod dense;
pub(crate) mod gpu;
mod lanczos;
mod tridiag;

pub use gpu::accelerator_available;

/// Operators at or below this size are solved densely even when stored
/// sparse; the full decomposition is cheaper than building a Krylov basis.
const DENSE_SOLVE_LIMIT: usize = 512;

/// An eigenvalue of the diffusion operator.
///
/// The operator is conjugated to a symmetric form before solving, so `im`
/// is zero throughout this crate; the component is kept so the ordering
/// and the result type are stable if a non-symmetric normalization is ever
/// added.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigenvalue<F: Float> {
    pub re: F,
    pub im: F,
}

impl<F: Float> Eigenvalue<F> {
    pub fn real(re: F) -> Self {
        Eigenvalue { re, im: F::zero() }
    }

    /// Modulus of the eigenvalue.
    pub fn magnitude(&self) -> F {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

/// Eigenvalues with their eigenvectors as matching columns, ordered by
/// descending magnitude; ties break on descending real part, then
/// descending imaginary part.
#[derive(Debug, Clone)]
pub struct EigenpairSet<F: Float> {
    values: Vec<Eigenvalue<F>>,
    vectors: Array2<F>,
}

impl<F: Float> EigenpairSet<F> {
    /// Pair up values and vector columns and establish the ordering.
    pub fn new(values: Vec<Eigenvalue<F>>, vectors: Array2<F>) -> Self {
        debug_assert_eq!(values.len(), vectors.ncols());

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| {
            let (va, vb) = (&values[a], &values[b]);
            vb.magnitude()
                .partial_cmp(&va.magnitude())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    vb.re
                        .partial_cmp(&va.re)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(
                    vb.im
                        .partial_cmp(&va.im)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        let sorted_values = order.iter().map(|&i| values[i]).collect();
        let mut sorted_vectors = Array2::zeros(vectors.dim());
        for (dst, &src) in order.iter().enumerate() {
            sorted_vectors
                .column_mut(dst)
                .assign(&vectors.column(src));
        }

        EigenpairSet {
            values: sorted_values,
            vectors: sorted_vectors,
        }
    }

    pub fn values(&self) -> &[Eigenvalue<F>] {
        &self.values
    }

    pub fn vectors(&self) -> &Array2<F> {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// How the eigenproblem is solved.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStrategy {
    /// Full symmetric decomposition of the densified operator.
    DenseEigh,
    /// Lanczos over the CPU CSR matrix-vector product.
    SparseLanczos,
    /// Lanczos over an accelerator-resident matrix-vector product.
    Accelerated,
}

impl std::fmt::Display for SolverStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SolverStrategy::DenseEigh => "dense",
            SolverStrategy::SparseLanczos => "lanczos",
            SolverStrategy::Accelerated => "accelerated",
        };
        f.write_str(name)
    }
}

/// Pick a strategy for an operator of the given shape.
///
/// An accelerator is used only when both requested and present. Without
/// one, dense storage or a small problem goes to the full decomposition
/// and everything else to Lanczos.
pub fn select_strategy(
    use_accelerator: bool,
    accelerator_present: bool,
    size: usize,
    is_dense: bool,
) -> SolverStrategy {
    if use_accelerator && accelerator_present {
        SolverStrategy::Accelerated
    } else if is_dense || size <= DENSE_SOLVE_LIMIT {
        SolverStrategy::DenseEigh
    } else {
        SolverStrategy::SparseLanczos
    }
}

/// Solve for the `k` dominant eigenpairs of the diffusion operator with the
/// given strategy.
///
/// The symmetric conjugate is decomposed and its eigenvectors are mapped
/// back to eigenvectors of the Markov operator, unit length in the L2
/// sense. Accelerated failures surface as errors here; falling back is the
/// caller's decision.
pub fn solve<F: Float>(
    op: &DiffusionOperator<F>,
    k: usize,
    strategy: SolverStrategy,
) -> Result<EigenpairSet<F>> {
    let (vals, vecs) = match strategy {
        SolverStrategy::DenseEigh => {
            let a = op.symmetric_conjugate().mapv(|x| x.to_f64().unwrap_or(0.0));
            dense::largest_eigenpairs(a, k)?
        }
        SolverStrategy::SparseLanczos => {
            let csr = op.symmetric_conjugate_csr();
            lanczos::largest_eigenpairs(op.size(), k, |x, y| {
                csr.spmv(x, y);
                Ok(())
            })?
        }
        SolverStrategy::Accelerated => {
            let csr = op.symmetric_conjugate_csr();
            gpu::largest_eigenpairs(&csr, k)?
        }
    };

    let values = vals
        .into_iter()
        .map(|v| Eigenvalue::real(F::cast(v)))
        .collect();
    let vectors = op.scale_eigenvectors(vecs.mapv(F::cast));
    Ok(EigenpairSet::new(values, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn strategy_selection_is_a_pure_function_of_its_inputs() {
        assert_eq!(
            select_strategy(true, true, 10_000, false),
            SolverStrategy::Accelerated
        );
        // requested but absent
        assert_eq!(
            select_strategy(true, false, 10_000, false),
            SolverStrategy::SparseLanczos
        );
        // present but not requested
        assert_eq!(
            select_strategy(false, true, 10_000, false),
            SolverStrategy::SparseLanczos
        );
        assert_eq!(
            select_strategy(false, false, 100, false),
            SolverStrategy::DenseEigh
        );
        // dense storage always solves densely on the CPU path
        assert_eq!(
            select_strategy(false, false, 10_000, true),
            SolverStrategy::DenseEigh
        );
    }

    #[test]
    fn eigenpairs_sort_by_descending_magnitude() {
        let values = vec![
            Eigenvalue::real(0.2_f64),
            Eigenvalue::real(-0.9),
            Eigenvalue::real(1.0),
        ];
        let vectors = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let set = EigenpairSet::new(values, vectors);

        assert_eq!(set.values()[0].re, 1.0);
        assert_eq!(set.values()[1].re, -0.9);
        assert_eq!(set.values()[2].re, 0.2);
        // columns follow their eigenvalues
        assert_eq!(set.vectors().column(0).to_vec(), vec![3.0, 6.0]);
        assert_eq!(set.vectors().column(1).to_vec(), vec![2.0, 5.0]);
        assert_eq!(set.vectors().column(2).to_vec(), vec![1.0, 4.0]);
    }

    #[test]
    fn magnitude_ties_break_on_the_real_part() {
        let values = vec![Eigenvalue::real(-0.5_f64), Eigenvalue::real(0.5)];
        let vectors = array![[1.0, 2.0]];
        let set = EigenpairSet::new(values, vectors);
        assert_eq!(set.values()[0].re, 0.5);
        assert_eq!(set.values()[1].re, -0.5);
    }
}
