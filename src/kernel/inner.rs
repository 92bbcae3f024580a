use ndarray::prelude::*;
use sprs::CsMat;

use crate::Float;

/// Methods every inner representation of a kernel matrix must provide.
pub trait Inner {
    type Elem: Float;

    fn row_sums(&self) -> Array1<Self::Elem>;
    fn size(&self) -> usize;
    fn diagonal(&self) -> Array1<Self::Elem>;
    fn get(&self, i: usize, j: usize) -> Self::Elem;
    fn to_dense(&self) -> Array2<Self::Elem>;
    fn nnz(&self) -> usize;
    fn is_dense(&self) -> bool;
}

/// Allows a kernel matrix to be either dense or sparse in a way that is
/// transparent to the caller.
#[derive(Debug, Clone)]
pub enum KernelInner<F: Float> {
    Dense(Array2<F>),
    Sparse(CsMat<F>),
}

impl<F: Float> Inner for Array2<F> {
    type Elem = F;

    fn row_sums(&self) -> Array1<F> {
        self.sum_axis(Axis(1))
    }
    fn size(&self) -> usize {
        self.ncols()
    }
    fn diagonal(&self) -> Array1<F> {
        self.diag().to_owned()
    }
    fn get(&self, i: usize, j: usize) -> F {
        self[(i, j)]
    }
    fn to_dense(&self) -> Array2<F> {
        self.clone()
    }
    fn nnz(&self) -> usize {
        self.len()
    }
    fn is_dense(&self) -> bool {
        true
    }
}

impl<F: Float> Inner for CsMat<F> {
    type Elem = F;

    fn row_sums(&self) -> Array1<F> {
        // the matrix is symmetric, so column sums equal row sums
        let mut sums = Array1::zeros(self.cols());
        for (val, (_, col)) in self.iter() {
            sums[col] = sums[col] + *val;
        }
        sums
    }
    fn size(&self) -> usize {
        self.cols()
    }
    fn diagonal(&self) -> Array1<F> {
        let diag_sprs = self.diag();
        let mut diag = Array1::zeros(diag_sprs.dim());
        for (i, elem) in diag_sprs.iter() {
            diag[i] = *elem;
        }
        diag
    }
    fn get(&self, i: usize, j: usize) -> F {
        self.get(i, j).copied().unwrap_or_else(F::zero)
    }
    fn to_dense(&self) -> Array2<F> {
        self.to_dense()
    }
    fn nnz(&self) -> usize {
        CsMat::nnz(self)
    }
    fn is_dense(&self) -> bool {
        false
    }
}
