use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiffusionMapsError>;

/// Errors raised by the diffusion-map pipeline.
///
/// All variants are raised synchronously at the point of detection and
/// propagate unchanged to the caller; the only retry in the crate is the
/// explicit, logged accelerated-to-CPU fallback in the orchestrator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DiffusionMapsError {
    #[error("requested {requested} samples from a dataset of {available} rows")]
    InvalidSampleSize { requested: usize, available: usize },
    #[error("kernel bandwidth must be positive and finite, got {0}")]
    InvalidBandwidth(f64),
    #[error("cut-off distance must be positive and finite, got {0}")]
    InvalidCutoff(f64),
    #[error("row {0} of the kernel matrix sums to zero")]
    DegenerateRow(usize),
    #[error("eigensolver did not converge: {0}")]
    EigenSolver(String),
    #[error("accelerated solver requested but no usable accelerator was found")]
    NoAccelerator,
    #[error("dataset row {row} has {len} entries, expected {expected}")]
    DimensionMismatch {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("requested {requested} eigenpairs from an operator of size {size}")]
    InvalidEigenpairCount { requested: usize, size: usize },
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ndarray::ShapeError),
}
