//! Diffusion maps for Rust
//!
//! A diffusion map is a nonlinear dimensionality-reduction embedding derived
//! from the eigenvectors of a Markov transition operator built from pairwise
//! Gaussian affinities. This crate implements the full computation pipeline:
//!
//! 1. optional deterministic [downsampling](sampling) of the input cloud,
//! 2. [kernel matrix](kernel) construction with an optional distance cut-off
//!    that induces a sparse representation,
//! 3. [row-stochastic normalization](markov) into a diffusion operator,
//! 4. extraction of the top eigenpairs through a dense CPU, sparse CPU or
//!    GPU-accelerated [eigensolver](solver).
//!
//! The sole entry point is the [`DiffusionMaps`] parameter builder:
//!
//! ```
//! use diffusion_maps::{DiffusionMaps, ParamGuard};
//! use ndarray::Array2;
//!
//! let data: Array2<f64> = Array2::from_shape_vec((4, 2), vec![
//!     0.0, 0.0, 0.1, 0.0, 5.0, 5.0, 5.1, 5.0,
//! ]).unwrap();
//!
//! let result = DiffusionMaps::params(2)
//!     .epsilon(2.0)
//!     .check()
//!     .unwrap()
//!     .compute(&data.view())
//!     .unwrap();
//!
//! // the trivial eigenvalue of a connected diffusion operator is 1
//! assert!((result.eigenvalues()[0].re - 1.0).abs() < 1e-9);
//! ```
//!
//! Data loading, serialization formats, plotting and CLI concerns live in the
//! surrounding tooling; this crate consumes numeric arrays and hands back
//! plain numeric results.

#[macro_use]
extern crate ndarray;

mod diffusion_map;
mod error;
pub mod hyperparams;
pub mod kernel;
pub mod markov;
pub mod sampling;
pub mod solver;
pub mod utils;

pub use diffusion_map::{ComputationResult, DiffusionMaps, DiffusionMapsValidParams};
pub use error::{DiffusionMapsError, Result};
pub use hyperparams::{DiffusionMapsParams, ParamGuard};
pub use kernel::KernelMatrix;
pub use markov::DiffusionOperator;
pub use sampling::{downsample, downsample_with_rng};
pub use solver::{Eigenvalue, EigenpairSet, SolverStrategy};

use ndarray::NdFloat;
use num_traits::FromPrimitive;
use std::iter::Sum;

/// Floating point numbers usable as matrix elements throughout the pipeline.
pub trait Float: NdFloat + FromPrimitive + Default + Sum {
    /// Lossy cast from any primitive numeric value.
    fn cast<T: num_traits::NumCast>(x: T) -> Self {
        num_traits::cast(x).unwrap()
    }
}

impl Float for f32 {}
impl Float for f64 {}
