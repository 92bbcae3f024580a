//! Two-stage hyperparameter checking.
//!
//! Parameters are built up on an unchecked [`DiffusionMapsParams`] and only
//! become usable after [`ParamGuard::check`] has validated them into a
//! [`DiffusionMapsValidParams`](crate::DiffusionMapsValidParams). Validation
//! happens before any matrix computation starts.

use crate::diffusion_map::DiffusionMapsValidParams;
use crate::error::DiffusionMapsError;
use crate::Float;

/// A set of parameters whose values have not been checked for validity. A
/// reference to the checked parameters can only be obtained after checking has
/// completed.
pub trait ParamGuard {
    /// The checked parameters
    type Checked;
    /// Error raised when a parameter value is rejected
    type Error: std::error::Error;

    /// Checks the parameters and returns a reference to the checked set if
    /// successful
    fn check_ref(&self) -> Result<&Self::Checked, Self::Error>;

    /// Checks the parameters and consumes self into the checked set
    fn check(self) -> Result<Self::Checked, Self::Error>;

    /// Calls `check()` and unwraps the result
    fn check_unwrap(self) -> Self::Checked
    where
        Self: Sized,
    {
        self.check().unwrap()
    }
}

/// Diffusion map parameters
///
/// The pipeline has two mandatory knobs: the kernel bandwidth `epsilon`,
/// which controls how fast affinity decays with squared distance, and the
/// number of eigenpairs to extract. The distance cut-off is optional and
/// switches the kernel to a sparse representation. `use_accelerator` states a
/// preference only; the solver still probes for a usable device at runtime.
pub struct DiffusionMapsParams<F: Float>(pub(crate) DiffusionMapsValidParams<F>);

impl<F: Float> DiffusionMapsParams<F> {
    /// Create a parameter set extracting `num_eigenpairs` eigenpairs, with
    /// `epsilon = 1.0`, no cut-off and the accelerator enabled when present.
    pub fn new(num_eigenpairs: usize) -> Self {
        Self(DiffusionMapsValidParams {
            epsilon: F::one(),
            num_eigenpairs,
            cutoff: None,
            use_accelerator: true,
        })
    }

    /// Set the Gaussian kernel bandwidth.
    pub fn epsilon(mut self, epsilon: F) -> Self {
        self.0.epsilon = epsilon;
        self
    }

    /// Set the distance cut-off beyond which affinities are forced to zero.
    ///
    /// A cut-off makes the kernel matrix sparse, bounding memory by the
    /// average neighbourhood size instead of the squared sample count.
    pub fn cutoff(mut self, cutoff: F) -> Self {
        self.0.cutoff = Some(cutoff);
        self
    }

    /// Whether the eigensolver may use a GPU when one is available.
    ///
    /// `false` disables the accelerated path outright; `true` leaves the
    /// decision to the runtime capability probe.
    pub fn use_accelerator(mut self, use_accelerator: bool) -> Self {
        self.0.use_accelerator = use_accelerator;
        self
    }

    /// Set the number of eigenpairs to extract.
    pub fn num_eigenpairs(mut self, num_eigenpairs: usize) -> Self {
        self.0.num_eigenpairs = num_eigenpairs;
        self
    }
}

impl<F: Float> Default for DiffusionMapsParams<F> {
    fn default() -> Self {
        Self::new(10)
    }
}

impl<F: Float> ParamGuard for DiffusionMapsParams<F> {
    type Checked = DiffusionMapsValidParams<F>;
    type Error = DiffusionMapsError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        if !(self.0.epsilon > F::zero()) || !self.0.epsilon.is_finite() {
            return Err(DiffusionMapsError::InvalidBandwidth(
                self.0.epsilon.to_f64().unwrap_or(f64::NAN),
            ));
        }
        if let Some(cutoff) = self.0.cutoff {
            if !(cutoff > F::zero()) || !cutoff.is_finite() {
                return Err(DiffusionMapsError::InvalidCutoff(
                    cutoff.to_f64().unwrap_or(f64::NAN),
                ));
            }
        }
        if self.0.num_eigenpairs == 0 {
            return Err(DiffusionMapsError::InvalidEigenpairCount {
                requested: 0,
                size: 0,
            });
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}
