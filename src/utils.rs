//! Small helpers for assembling datasets from caller-provided rows.

use ndarray::Array2;

use crate::error::{DiffusionMapsError, Result};
use crate::Float;

/// Stack a slice of equally sized rows into a dense dataset.
///
/// The pipeline itself operates on `Array2` and cannot observe ragged input;
/// this is the checked conversion for callers holding row-per-point data.
/// Fails with [`DiffusionMapsError::DimensionMismatch`] naming the first
/// offending row.
pub fn dataset_from_rows<F: Float>(rows: &[Vec<F>]) -> Result<Array2<F>> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);

    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(DiffusionMapsError::DimensionMismatch {
                row: i,
                len: row.len(),
                expected: ncols,
            });
        }
    }

    let mut data = Vec::with_capacity(nrows * ncols);
    for row in rows {
        data.extend_from_slice(row);
    }

    Ok(Array2::from_shape_vec((nrows, ncols), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_consistent_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let data = dataset_from_rows(&rows).unwrap();
        assert_eq!(data.dim(), (3, 2));
        assert_eq!(data[[2, 1]], 6.0);
    }

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0], vec![5.0, 6.0]];
        let err = dataset_from_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            DiffusionMapsError::DimensionMismatch {
                row: 1,
                len: 1,
                expected: 2,
            }
        ));
    }

    #[test]
    fn empty_input_is_an_empty_dataset() {
        let rows: Vec<Vec<f64>> = Vec::new();
        let data = dataset_from_rows(&rows).unwrap();
        assert_eq!(data.dim(), (0, 0));
    }
}
