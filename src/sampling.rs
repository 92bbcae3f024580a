//! Downsampling of large point clouds.
//!
//! When a dataset is too large for an N×N kernel matrix, a subset of rows is
//! drawn without replacement before the pipeline runs. The selected indices
//! are sorted ascending, so the subset preserves the original row order and
//! drawing all N rows reproduces the input exactly.

use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;

use crate::error::{DiffusionMapsError, Result};
use crate::Float;

/// Draw `num_samples` rows from `data` without replacement.
///
/// Non-deterministic: uses the thread-local RNG. Use [`downsample_with_rng`]
/// with a seeded generator (e.g. `Xoshiro256Plus::seed_from_u64`) when
/// reproducible subsets are needed.
///
/// Fails with [`DiffusionMapsError::InvalidSampleSize`] when `num_samples` is
/// zero or exceeds the number of rows. The source dataset is never mutated.
pub fn downsample<F: Float>(data: &ArrayView2<F>, num_samples: usize) -> Result<Array2<F>> {
    downsample_with_rng(data, num_samples, &mut rand::thread_rng())
}

/// Draw `num_samples` rows from `data` without replacement using `rng`.
///
/// Deterministic for a fixed generator state: the same seed always selects
/// the same rows.
pub fn downsample_with_rng<F: Float, R: Rng + ?Sized>(
    data: &ArrayView2<F>,
    num_samples: usize,
    rng: &mut R,
) -> Result<Array2<F>> {
    let nrows = data.nrows();
    if num_samples == 0 || num_samples > nrows {
        return Err(DiffusionMapsError::InvalidSampleSize {
            requested: num_samples,
            available: nrows,
        });
    }

    let mut indices = rand::seq::index::sample(rng, nrows, num_samples).into_vec();
    indices.sort_unstable();

    debug!(
        "downsampled {} of {} rows ({} features)",
        num_samples,
        nrows,
        data.ncols()
    );

    Ok(data.select(Axis(0), &indices))
}
