//! Diffusion map computation.
//!
//! The pipeline runs in three stages: a Gaussian affinity kernel over the
//! samples (dense, or sparse under a distance cut-off), row normalization
//! into a Markov transition operator, and extraction of the dominant
//! eigenpairs through one of the solver strategies. The embedding of each
//! sample is its row across the returned eigenvector columns.

use ndarray::{Array2, ArrayView2};

use crate::error::{DiffusionMapsError, Result};
use crate::hyperparams::{DiffusionMapsParams, ParamGuard};
use crate::kernel::KernelMatrix;
use crate::markov::DiffusionOperator;
use crate::solver::{self, Eigenvalue, EigenpairSet, SolverStrategy};
use crate::Float;

/// Entry point of the crate.
///
/// ```rust
/// use diffusion_maps::{DiffusionMaps, ParamGuard};
/// use ndarray::array;
///
/// let data: ndarray::Array2<f64> = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
/// let result = DiffusionMaps::params(2)
///     .epsilon(2.0)
///     .use_accelerator(false)
///     .check()
///     .unwrap()
///     .compute(&data.view())
///     .unwrap();
///
/// // the trivial stationary pair always comes first
/// assert!((result.eigenvalues()[0].re - 1.0).abs() < 1e-9);
/// ```
pub struct DiffusionMaps;

impl DiffusionMaps {
    /// Parameter set extracting `num_eigenpairs` eigenpairs; see
    /// [`DiffusionMapsParams`] for the remaining knobs.
    pub fn params<F: Float>(num_eigenpairs: usize) -> DiffusionMapsParams<F> {
        DiffusionMapsParams::new(num_eigenpairs)
    }
}

/// A checked set of diffusion map parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionMapsValidParams<F: Float> {
    pub(crate) epsilon: F,
    pub(crate) num_eigenpairs: usize,
    pub(crate) cutoff: Option<F>,
    pub(crate) use_accelerator: bool,
}

impl<F: Float> DiffusionMapsValidParams<F> {
    pub fn epsilon(&self) -> F {
        self.epsilon
    }

    pub fn num_eigenpairs(&self) -> usize {
        self.num_eigenpairs
    }

    pub fn cutoff(&self) -> Option<F> {
        self.cutoff
    }

    pub fn use_accelerator(&self) -> bool {
        self.use_accelerator
    }

    /// Run the full pipeline on `data` (one sample per row).
    ///
    /// A failure of the accelerated solver is not fatal. It is logged and
    /// the solve is retried on the CPU; [`ComputationResult::solver`]
    /// records which strategy actually produced the result.
    pub fn compute(&self, data: &ArrayView2<F>) -> Result<ComputationResult<F>> {
        let num_samples = data.nrows();
        let k = self.num_eigenpairs;
        if k > num_samples {
            return Err(DiffusionMapsError::InvalidEigenpairCount {
                requested: k,
                size: num_samples,
            });
        }

        log::info!(
            "diffusion map over {} samples of dimension {}, {} eigenpairs",
            num_samples,
            data.ncols(),
            k
        );

        let kernel = KernelMatrix::build(data, self.epsilon, self.cutoff)?;
        let operator = DiffusionOperator::normalize(kernel)?;

        let accelerator_present = self.use_accelerator && solver::accelerator_available();
        let mut strategy = solver::select_strategy(
            self.use_accelerator,
            accelerator_present,
            operator.size(),
            operator.is_dense(),
        );
        log::debug!("solver strategy: {}", strategy);

        let pairs = match solver::solve(&operator, k, strategy) {
            Ok(pairs) => pairs,
            Err(err) if strategy == SolverStrategy::Accelerated => {
                log::warn!("accelerated solve failed ({}), retrying on the CPU", err);
                strategy = solver::select_strategy(
                    false,
                    false,
                    operator.size(),
                    operator.is_dense(),
                );
                solver::solve(&operator, k, strategy)?
            }
            Err(err) => return Err(err),
        };

        Ok(ComputationResult {
            pairs,
            kernel: operator.into_kernel(),
            solver: strategy,
        })
    }
}

impl<F: Float> DiffusionMapsParams<F> {
    /// Check the parameters and run the pipeline in one call.
    pub fn compute(&self, data: &ArrayView2<F>) -> Result<ComputationResult<F>> {
        self.check_ref()?.compute(data)
    }
}

/// Everything a diffusion map run produces.
#[derive(Debug, Clone)]
pub struct ComputationResult<F: Float> {
    pairs: EigenpairSet<F>,
    kernel: KernelMatrix<F>,
    solver: SolverStrategy,
}

impl<F: Float> ComputationResult<F> {
    /// Eigenvalues of the transition operator, descending by magnitude. The
    /// first is the trivial stationary eigenvalue, 1 up to solver accuracy.
    pub fn eigenvalues(&self) -> &[Eigenvalue<F>] {
        self.pairs.values()
    }

    /// Unit-length eigenvectors as columns, in the order of
    /// [`eigenvalues`](Self::eigenvalues). Row `i` across these columns is
    /// the embedding of sample `i`.
    pub fn eigenvectors(&self) -> &Array2<F> {
        self.pairs.vectors()
    }

    pub fn eigenpairs(&self) -> &EigenpairSet<F> {
        &self.pairs
    }

    /// The affinity kernel the operator was derived from.
    pub fn kernel_matrix(&self) -> &KernelMatrix<F> {
        &self.kernel
    }

    /// The strategy that produced the eigenpairs, after any fallback.
    pub fn solver(&self) -> SolverStrategy {
        self.solver
    }
}
