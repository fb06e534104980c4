//! Compressed Sparse Blocks (CSB) format and its multiply kernels
//!
//! The matrix is cut into square `beta × beta` blocks, `beta = max(1, floor(sqrt(n_rows)))`.
//! Blocks are numbered row-major (`blockrow * num_blockcols + blockcol`) and `block_ptr`
//! is a CSR-style prefix over the per-block nonzero counts. Inside a block, row and
//! column offsets are stored relative to the block's corner, which keeps them small.

use num_traits::Num;
use rayon::prelude::*;
use std::ops::AddAssign;

use crate::constants::MIN_CSB_BETA;
use crate::error::Result;

/// A sparse matrix in cache-blocked (CSB) format
#[derive(Debug, Clone)]
pub struct CsbMatrix<T> {
    pub n_rows: usize,
    pub n_cols: usize,

    /// Block edge length
    pub beta: usize,

    pub num_blockrows: usize,
    pub num_blockcols: usize,

    /// Block pointers (size: num_blockrows * num_blockcols + 1)
    pub block_ptr: Vec<usize>,

    /// Row offset of each nonzero inside its block, in `[0, beta)`
    pub row_ind: Vec<u32>,

    /// Column offset of each nonzero inside its block, in `[0, beta)`
    pub col_ind: Vec<u32>,

    pub values: Vec<T>,
}

/// Block edge for a matrix with `n_rows` rows. Never zero.
pub fn block_size(n_rows: usize) -> usize {
    ((n_rows as f64).sqrt() as usize).max(MIN_CSB_BETA)
}

impl<T> CsbMatrix<T> {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blockrows * self.num_blockcols
    }

    /// Nonzero range of block `(bi, bj)`
    #[inline]
    pub fn block_range(&self, bi: usize, bj: usize) -> std::ops::Range<usize> {
        let id = bi * self.num_blockcols + bj;
        self.block_ptr[id]..self.block_ptr[id + 1]
    }

    /// Number of blocks holding at least one nonzero
    pub fn occupied_blocks(&self) -> usize {
        self.block_ptr.windows(2).filter(|w| w[1] > w[0]).count()
    }
}

/// Sequential CSB multiply: `y += A x`.
///
/// `y` must be zeroed by the caller for a plain product.
///
/// # Panics
///
/// Panics if `x` is shorter than `csb.n_cols` or `y.len() != csb.n_rows`.
pub fn multiply_csb_seq<T>(csb: &CsbMatrix<T>, x: &[T], y: &mut [T])
where
    T: Copy + Num + AddAssign,
{
    assert!(x.len() >= csb.n_cols, "x must cover every column of A");
    assert_eq!(y.len(), csb.n_rows, "y.len() must equal n_rows");

    let beta = csb.beta;
    for bi in 0..csb.num_blockrows {
        let row_start = bi * beta;
        for bj in 0..csb.num_blockcols {
            let col_start = bj * beta;
            for k in csb.block_range(bi, bj) {
                let i = row_start + csb.row_ind[k] as usize;
                let j = col_start + csb.col_ind[k] as usize;
                y[i] += csb.values[k] * x[j];
            }
        }
    }
}

/// Parallel CSB multiply on the current rayon pool: `y += A x`.
///
/// Each task owns one block-row. It sums into a private `beta`-long buffer and adds the
/// buffer into its own slice of `y`; block-rows cover disjoint row ranges, so no two
/// tasks touch the same output entry. The last block-row may be shorter than `beta`.
///
/// # Panics
///
/// Panics if `x` is shorter than `csb.n_cols` or `y.len() != csb.n_rows`.
pub fn multiply_csb<T>(csb: &CsbMatrix<T>, x: &[T], y: &mut [T])
where
    T: Copy + Num + AddAssign + Send + Sync,
{
    assert!(x.len() >= csb.n_cols, "x must cover every column of A");
    assert_eq!(y.len(), csb.n_rows, "y.len() must equal n_rows");

    let beta = csb.beta;
    y.par_chunks_mut(beta).enumerate().for_each_init(
        || vec![T::zero(); beta],
        |acc, (bi, y_block)| {
            acc.iter_mut().for_each(|v| *v = T::zero());

            for bj in 0..csb.num_blockcols {
                let col_start = bj * beta;
                for k in csb.block_range(bi, bj) {
                    acc[csb.row_ind[k] as usize] +=
                        csb.values[k] * x[col_start + csb.col_ind[k] as usize];
                }
            }

            for (yi, &partial) in y_block.iter_mut().zip(acc.iter()) {
                *yi += partial;
            }
        },
    );
}

/// Parallel CSB multiply on a dedicated pool of `n_threads` workers.
pub fn multiply_csb_with_threads<T>(
    csb: &CsbMatrix<T>,
    x: &[T],
    y: &mut [T],
    n_threads: usize,
) -> Result<()>
where
    T: Copy + Num + AddAssign + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    pool.install(|| multiply_csb(csb, x, y));
    Ok(())
}
