//! Conversion functions between matrix formats

use num_traits::Num;
use tracing::debug;

use crate::matrix::csb::{block_size, CsbMatrix};
use crate::matrix::SparseMatrixCSR;

impl<T: Copy + Num> SparseMatrixCSR<T> {
    /// Converts this CSR matrix to CSB format
    ///
    /// Counting sort over block ids: count nonzeros per block, prefix-sum the counts
    /// into `block_ptr`, then re-scan the rows and drop each nonzero at its block's
    /// write cursor. Within a block, entries keep the row-major scan order of the source.
    pub fn to_csb(&self) -> CsbMatrix<T> {
        let beta = block_size(self.n_rows);
        let num_blockrows = (self.n_rows + beta - 1) / beta;
        let num_blockcols = (self.n_cols + beta - 1) / beta;
        let num_blocks = num_blockrows * num_blockcols;

        debug!(
            beta,
            num_blockrows, num_blockcols, nnz = self.nnz(), "converting CSR to CSB"
        );

        // Phase 1: count
        let mut block_counts = vec![0usize; num_blocks];
        for i in 0..self.n_rows {
            let bi = i / beta;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let bj = self.col_idx[k] / beta;
                block_counts[bi * num_blockcols + bj] += 1;
            }
        }

        // Phase 2: pointers, reusing the counts as write cursors
        let mut block_ptr = vec![0usize; num_blocks + 1];
        for b in 0..num_blocks {
            block_ptr[b + 1] = block_ptr[b] + block_counts[b];
            block_counts[b] = block_ptr[b];
        }
        let mut cursor = block_counts;

        // Phase 3: scatter
        let nnz = self.nnz();
        let mut row_ind = vec![0u32; nnz];
        let mut col_ind = vec![0u32; nnz];
        let mut values = vec![T::zero(); nnz];

        for i in 0..self.n_rows {
            let bi = i / beta;
            let local_i = (i % beta) as u32;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k];
                let block_id = bi * num_blockcols + j / beta;

                let pos = cursor[block_id];
                row_ind[pos] = local_i;
                col_ind[pos] = (j % beta) as u32;
                values[pos] = self.values[k];
                cursor[block_id] += 1;
            }
        }

        CsbMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            beta,
            num_blockrows,
            num_blockcols,
            block_ptr,
            row_ind,
            col_ind,
            values,
        }
    }
}
