//! Coordinate (triplet) form of a global matrix

use crate::error::{Result, SpmvError};

/// An undistributed matrix as a list of `(row, col, value)` entries.
///
/// Entries are kept in input order; duplicates are allowed and are summed by the
/// multiply kernels like any other pair of nonzeros.
#[derive(Debug, Clone, PartialEq)]
pub struct CooMatrix<T> {
    pub n_rows: usize,
    pub n_cols: usize,
    pub entries: Vec<(usize, usize, T)>,
}

impl<T> CooMatrix<T> {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            entries: Vec::new(),
        }
    }

    pub fn with_entries(n_rows: usize, n_cols: usize, entries: Vec<(usize, usize, T)>) -> Self {
        Self {
            n_rows,
            n_cols,
            entries,
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: T) {
        self.entries.push((row, col, value));
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Checks every entry against the declared dimensions.
    pub fn validate(&self) -> Result<()> {
        for &(row, col, _) in &self.entries {
            if row >= self.n_rows {
                return Err(SpmvError::RowOutOfRange {
                    row,
                    n_rows: self.n_rows,
                });
            }
            if col >= self.n_cols {
                return Err(SpmvError::ColumnOutOfRange {
                    col,
                    n_cols: self.n_cols,
                });
            }
        }
        Ok(())
    }
}
