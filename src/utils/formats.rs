//! Utilities for converting between our matrix formats and external libraries
//!
//! sprs + ndarray provide an SpMV implementation that shares no code with ours, which
//! makes it a convenient oracle in tests and benchmarks.

use crate::matrix::SparseMatrixCSR;
use ndarray::Array1;
use sprs::{CsMat, TriMat};

/// Converts our CSR matrix format to sprs CsMat format
///
/// Goes through a triplet matrix so that rows with unsorted or repeated column
/// indices are accepted (repeats are summed, as our kernels do).
pub fn to_sprs_csr(matrix: &SparseMatrixCSR<f64>) -> CsMat<f64> {
    let mut row_inds = Vec::with_capacity(matrix.nnz());
    for i in 0..matrix.n_rows {
        let len = matrix.row_ptr[i + 1] - matrix.row_ptr[i];
        row_inds.extend(std::iter::repeat(i).take(len));
    }

    TriMat::from_triplets(
        (matrix.n_rows, matrix.n_cols),
        row_inds,
        matrix.col_idx.clone(),
        matrix.values.clone(),
    )
    .to_csr()
}

/// Computes `A x` with sprs.
///
/// # Panics
///
/// Panics if `x.len() != matrix.n_cols`.
pub fn reference_spmv_sprs(matrix: &SparseMatrixCSR<f64>, x: &[f64]) -> Vec<f64> {
    assert_eq!(x.len(), matrix.n_cols, "x.len() must equal n_cols");
    let a = to_sprs_csr(matrix);
    let x = Array1::from(x.to_vec());
    let y: Array1<f64> = &a * &x;
    y.to_vec()
}
