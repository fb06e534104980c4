//! Compressed Sparse Row (CSR) matrix format implementation

use std::fmt;
use num_traits::Num;

use crate::error::{Result, SpmvError};

/// A sparse matrix in Compressed Sparse Row (CSR) format
///
/// The CSR format stores a sparse matrix using three arrays:
/// - row_ptr: Array of size n_rows + 1 containing indices into col_idx and values arrays
/// - col_idx: Array of size nnz containing column indices of non-zero elements
/// - values: Array of size nnz containing the non-zero values
///
/// On a rank of the distributed group this holds the rank's own rows. Before ghost
/// resolution `col_idx` holds global column ids and `n_cols` is the global dimension;
/// afterwards `col_idx` addresses the extended local vector and `n_cols` is its length.
#[derive(Clone)]
pub struct SparseMatrixCSR<T> {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    /// Row pointers (size: n_rows + 1)
    /// row_ptr[i] is the index in col_idx and values where row i starts
    /// row_ptr[n_rows] is equal to nnz
    pub row_ptr: Vec<usize>,

    /// Column indices (size: nnz)
    pub col_idx: Vec<usize>,

    /// Non-zero values (size: nnz)
    pub values: Vec<T>,
}

/// The rows a single rank owns, in local row numbering.
pub type LocalMatrix<T> = SparseMatrixCSR<T>;

impl<T> SparseMatrixCSR<T>
where
    T: Copy + Num,
{
    /// Creates a new CSR matrix with the given dimensions and data
    ///
    /// # Panics
    ///
    /// Panics if the input arrays are inconsistent:
    /// - row_ptr.len() must be n_rows + 1
    /// - col_idx.len() must equal values.len()
    /// - row_ptr[n_rows] must equal col_idx.len()
    /// - every column index must be below n_cols
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr.len() must be n_rows + 1");
        assert_eq!(col_idx.len(), values.len(), "col_idx.len() must equal values.len()");
        assert_eq!(
            row_ptr[n_rows], col_idx.len(),
            "row_ptr[n_rows] must equal col_idx.len()"
        );

        for &col in &col_idx {
            assert!(col < n_cols, "Column index {} out of bounds (n_cols = {})", col, n_cols);
        }

        Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Fallible counterpart of [`SparseMatrixCSR::new`] for arrays coming from outside
    /// the crate. Also checks that `row_ptr` starts at zero and never decreases.
    pub fn try_new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        if row_ptr.len() != n_rows + 1 {
            return Err(SpmvError::LengthMismatch {
                what: "row_ptr",
                expected: n_rows + 1,
                actual: row_ptr.len(),
            });
        }
        if col_idx.len() != values.len() {
            return Err(SpmvError::LengthMismatch {
                what: "values",
                expected: col_idx.len(),
                actual: values.len(),
            });
        }
        if row_ptr[0] != 0
            || row_ptr.windows(2).any(|w| w[0] > w[1])
            || row_ptr[n_rows] != col_idx.len()
        {
            return Err(SpmvError::InvalidDimension(
                "row_ptr must start at 0, never decrease and end at nnz".to_string(),
            ));
        }
        if let Some(&col) = col_idx.iter().find(|&&col| col >= n_cols) {
            return Err(SpmvError::ColumnOutOfRange { col, n_cols });
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Builds a CSR matrix from `(row, col, value)` triples.
    ///
    /// Rows are bucketed with a counting sort; entries keep their stream order within a
    /// row. Duplicated coordinates are kept as separate entries, so they add up in any
    /// product. Out-of-range rows or columns are rejected.
    pub fn from_triples<I>(n_rows: usize, n_cols: usize, triples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, T)>,
    {
        let triples: Vec<(usize, usize, T)> = triples.into_iter().collect();

        let mut row_ptr = vec![0usize; n_rows + 1];
        for &(row, col, _) in &triples {
            if row >= n_rows {
                return Err(SpmvError::RowOutOfRange { row, n_rows });
            }
            if col >= n_cols {
                return Err(SpmvError::ColumnOutOfRange { col, n_cols });
            }
            row_ptr[row + 1] += 1;
        }
        for i in 0..n_rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        let nnz = triples.len();
        let mut col_idx = vec![0; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut cursor = row_ptr.clone();

        for (row, col, val) in triples {
            let pos = cursor[row];
            col_idx[pos] = col;
            values[pos] = val;
            cursor[row] += 1;
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns an iterator over the non-zero elements in row i
    ///
    /// Each item is a tuple (col_idx, value) representing a non-zero element
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        assert!(i < self.n_rows, "Row index out of bounds");

        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];

        self.col_idx[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&col, val)| (col, val))
    }

    /// Computes the dot product of row `i` with `x`, accumulating in column order.
    #[inline]
    pub fn row_dot(&self, i: usize, x: &[T]) -> T {
        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];
        let mut sum = T::zero();
        for k in start..end {
            sum = sum + self.values[k] * x[self.col_idx[k]];
        }
        sum
    }

    /// Creates an empty matrix with the given dimensions
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            row_ptr: vec![0; n_rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T: fmt::Debug + Copy + Num> fmt::Debug for SparseMatrixCSR<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrixCSR {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz())?;

        let max_rows_to_print = 5.min(self.n_rows);

        if max_rows_to_print > 0 {
            writeln!(f, "  content sample:")?;

            for i in 0..max_rows_to_print {
                write!(f, "    row {}: ", i)?;
                let start = self.row_ptr[i];
                let end = self.row_ptr[i + 1];

                if start == end {
                    writeln!(f, "(empty)")?;
                    continue;
                }

                let shown = 5.min(end - start);
                for j in start..(start + shown) {
                    write!(f, "({}, {:?}) ", self.col_idx[j], self.values[j])?;
                }
                if end - start > shown {
                    write!(f, "... ({} more)", end - start - shown)?;
                }
                writeln!(f)?;
            }

            if self.n_rows > max_rows_to_print {
                writeln!(f, "    ... ({} more rows)", self.n_rows - max_rows_to_print)?;
            }
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix() {
        let matrix = SparseMatrixCSR::new(
            3, 3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1, 2, 3, 4, 5],
        );

        assert_eq!(matrix.n_rows, 3);
        assert_eq!(matrix.n_cols, 3);
        assert_eq!(matrix.nnz(), 5);
    }

    #[test]
    fn test_from_triples_buckets_rows_stably() {
        let matrix = SparseMatrixCSR::from_triples(
            3,
            4,
            vec![(2, 3, 1.0), (0, 1, 2.0), (2, 0, 3.0), (0, 0, 4.0)],
        )
        .unwrap();

        assert_eq!(matrix.row_ptr, vec![0, 2, 2, 4]);
        assert_eq!(matrix.col_idx, vec![1, 0, 3, 0]);
        assert_eq!(matrix.values, vec![2.0, 4.0, 1.0, 3.0]);
    }

    #[test]
    fn test_from_triples_rejects_bad_indices() {
        let err = SparseMatrixCSR::from_triples(2, 2, vec![(2, 0, 1.0)]).unwrap_err();
        assert!(matches!(err, SpmvError::RowOutOfRange { row: 2, n_rows: 2 }));

        let err = SparseMatrixCSR::from_triples(2, 2, vec![(0, 5, 1.0)]).unwrap_err();
        assert!(matches!(err, SpmvError::ColumnOutOfRange { col: 5, n_cols: 2 }));
    }

    #[test]
    fn test_from_triples_empty() {
        let matrix = SparseMatrixCSR::<f64>::from_triples(0, 0, Vec::new()).unwrap();
        assert_eq!(matrix.row_ptr, vec![0]);
        assert_eq!(matrix.nnz(), 0);
    }

    #[test]
    fn test_try_new_validates() {
        assert!(SparseMatrixCSR::try_new(2, 2, vec![0, 2, 1], vec![0], vec![1.0]).is_err());
        assert!(SparseMatrixCSR::try_new(1, 2, vec![0, 1], vec![2], vec![1.0]).is_err());
        assert!(SparseMatrixCSR::try_new(1, 2, vec![0, 1], vec![1], vec![1.0]).is_ok());
    }

    #[test]
    fn test_row_iter_and_dot() {
        let matrix = SparseMatrixCSR::new(
            3, 3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1, 2, 3, 4, 5],
        );

        let row2: Vec<_> = matrix.row_iter(2).collect();
        assert_eq!(row2, vec![(0, &4), (2, &5)]);
        assert_eq!(matrix.row_dot(0, &[1, 1, 1]), 3);
        assert_eq!(matrix.row_dot(2, &[1, 0, 2]), 14);
    }

    #[test]
    #[should_panic(expected = "row_ptr.len() must be n_rows + 1")]
    fn test_invalid_row_ptr() {
        SparseMatrixCSR::new(
            3, 3,
            vec![0, 2, 3], // Missing last element
            vec![0, 1, 1, 0, 2],
            vec![1, 2, 3, 4, 5],
        );
    }
}
