//! Reference implementation of SpMV
//!
//! A single-threaded row-by-row multiply used as the baseline for correctness
//! testing. It sums each row in the same order as the parallel CSR kernel.

use num_traits::Num;

use crate::matrix::SparseMatrixCSR;

/// Computes `y = A x` one row at a time, overwriting `y`.
///
/// # Panics
///
/// Panics if `x` is shorter than `a.n_cols` or `y.len() != a.n_rows`.
pub fn reference_spmv<T>(a: &SparseMatrixCSR<T>, x: &[T], y: &mut [T])
where
    T: Copy + Num,
{
    assert!(x.len() >= a.n_cols, "x must cover every column of A");
    assert_eq!(y.len(), a.n_rows, "y.len() must equal n_rows");

    for (i, yi) in y.iter_mut().enumerate() {
        *yi = a.row_dot(i, x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_spmv() {
        //    [1 2 0]
        //    [0 0 0]
        //    [4 0 5]
        let a = SparseMatrixCSR::new(
            3, 3,
            vec![0, 2, 2, 4],
            vec![0, 1, 0, 2],
            vec![1.0, 2.0, 4.0, 5.0],
        );
        let mut y = vec![9.0; 3];
        reference_spmv(&a, &[1.0, 2.0, 3.0], &mut y);
        assert_eq!(y, vec![5.0, 0.0, 19.0]);
    }

    #[test]
    fn test_unit_diagonal() {
        let a = SparseMatrixCSR::<i64>::from_triples(4, 4, (0..4).map(|i| (i, i, 1))).unwrap();
        let x = vec![3, 1, 4, 1];
        let mut y = vec![0; 4];
        reference_spmv(&a, &x, &mut y);
        assert_eq!(y, x);
    }
}
