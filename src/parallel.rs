//! # Parallel CSR SpMV
//!
//! Thread-parallel `y = A x` over the row-compressed layout using Rayon. The row range
//! is cut into chunks according to a [`Schedule`]; every row is still summed by a single
//! task in column order, so all schedules produce bitwise-identical output.
//!
//! The kernels run on whatever rayon pool is current. Pin the thread count with
//! `ThreadPool::install`, e.g. the pool from [`SpmvConfig::build_pool`].
//!
//! [`SpmvConfig::build_pool`]: crate::matrix::SpmvConfig::build_pool

use num_traits::Num;
use rayon::prelude::*;

use crate::constants::GUIDED_DIVISOR;
use crate::matrix::{Schedule, SparseMatrixCSR};

/// Performs `y = A x` with the given scheduling policy.
///
/// `chunk_size` is the number of rows per chunk for `Static` and `Dynamic`, and the
/// smallest chunk `Guided` will hand out. A value of zero is treated as one.
///
/// # Arguments
///
/// * `a` - Matrix in CSR format
/// * `x` - Input vector, at least `a.n_cols` long
/// * `y` - Output vector of length `a.n_rows`, overwritten
/// * `schedule` - Work distribution policy
/// * `chunk_size` - Rows per chunk
///
/// # Examples
///
/// ```
/// use distspmv::{multiply_csr, Schedule, SparseMatrixCSR};
///
/// let a = SparseMatrixCSR::<f64>::new(
///     2, 2,
///     vec![0, 1, 2],
///     vec![0, 1],
///     vec![2.0, 3.0],
/// );
///
/// let mut y = vec![0.0; 2];
/// multiply_csr(&a, &[1.0, 1.0], &mut y, Schedule::Dynamic, 1);
/// assert_eq!(y, vec![2.0, 3.0]);
/// ```
pub fn multiply_csr<T>(
    a: &SparseMatrixCSR<T>,
    x: &[T],
    y: &mut [T],
    schedule: Schedule,
    chunk_size: usize,
) where
    T: Copy + Num + Send + Sync,
{
    assert!(x.len() >= a.n_cols, "x must cover every column of A");
    assert_eq!(y.len(), a.n_rows, "y.len() must equal n_rows");

    let chunk_size = chunk_size.max(1);

    match schedule {
        Schedule::Static => multiply_static(a, x, y, chunk_size),

        // One rayon task per chunk: idle workers steal the next unclaimed one
        Schedule::Dynamic => {
            y.par_chunks_mut(chunk_size)
                .with_max_len(1)
                .enumerate()
                .for_each(|(c, ys)| fill_rows(a, x, c * chunk_size, ys));
        }

        Schedule::Guided => {
            let sizes = guided_chunks(a.n_rows, chunk_size, rayon::current_num_threads());
            split_rows(y, &sizes)
                .into_par_iter()
                .with_max_len(1)
                .for_each(|(start, ys)| fill_rows(a, x, start, ys));
        }
    }
}

/// Chunks are dealt round-robin to one bucket per worker before any work starts.
fn multiply_static<T>(a: &SparseMatrixCSR<T>, x: &[T], y: &mut [T], chunk_size: usize)
where
    T: Copy + Num + Send + Sync,
{
    let n_workers = rayon::current_num_threads().max(1);
    let mut buckets: Vec<Vec<(usize, &mut [T])>> = (0..n_workers).map(|_| Vec::new()).collect();

    for (c, ys) in y.chunks_mut(chunk_size).enumerate() {
        buckets[c % n_workers].push((c * chunk_size, ys));
    }

    buckets
        .into_par_iter()
        .with_max_len(1)
        .for_each(|bucket| {
            for (start, ys) in bucket {
                fill_rows(a, x, start, ys);
            }
        });
}

#[inline]
fn fill_rows<T>(a: &SparseMatrixCSR<T>, x: &[T], first_row: usize, ys: &mut [T])
where
    T: Copy + Num,
{
    for (offset, yi) in ys.iter_mut().enumerate() {
        *yi = a.row_dot(first_row + offset, x);
    }
}

/// Chunk lengths for the guided policy over `n_rows` rows.
///
/// Each chunk takes `ceil(remaining / (GUIDED_DIVISOR * n_threads))` rows, but never
/// fewer than `min_chunk` (except for the final remainder).
pub fn guided_chunks(n_rows: usize, min_chunk: usize, n_threads: usize) -> Vec<usize> {
    let min_chunk = min_chunk.max(1);
    let divisor = GUIDED_DIVISOR * n_threads.max(1);

    let mut sizes = Vec::new();
    let mut remaining = n_rows;
    while remaining > 0 {
        let size = ((remaining + divisor - 1) / divisor).max(min_chunk).min(remaining);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

/// Splits `y` into consecutive slices of the given lengths, tagged with their first row.
fn split_rows<'a, T>(y: &'a mut [T], sizes: &[usize]) -> Vec<(usize, &'a mut [T])> {
    let mut parts = Vec::with_capacity(sizes.len());
    let mut rest = y;
    let mut start = 0;
    for &size in sizes {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(size);
        parts.push((start, head));
        rest = tail;
        start += size;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrixCSR<f64> {
        //    [1 0 2]
        //    [0 0 0]
        //    [3 4 0]
        //    [0 0 5]
        SparseMatrixCSR::new(
            4, 3,
            vec![0, 2, 2, 4, 5],
            vec![0, 2, 0, 1, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
    }

    #[test]
    fn test_all_schedules() {
        let a = sample();
        let x = [1.0, 2.0, 3.0];
        for schedule in Schedule::ALL {
            for chunk in [0, 1, 2, 3, 10] {
                let mut y = vec![f64::NAN; 4];
                multiply_csr(&a, &x, &mut y, schedule, chunk);
                assert_eq!(y, vec![7.0, 0.0, 11.0, 15.0], "{} chunk {}", schedule, chunk);
            }
        }
    }

    #[test]
    fn test_guided_chunks_shrink() {
        let sizes = guided_chunks(1000, 10, 4);
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
        assert_eq!(sizes[0], 125);
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
        assert!(sizes[..sizes.len() - 1].iter().all(|&s| s >= 10));
    }

    #[test]
    fn test_guided_chunks_empty() {
        assert!(guided_chunks(0, 5, 4).is_empty());
        assert_eq!(guided_chunks(3, 5, 4), vec![3]);
    }

    #[test]
    fn test_split_rows() {
        let mut y = vec![0; 6];
        let parts = split_rows(&mut y, &[3, 2, 1]);
        let starts: Vec<usize> = parts.iter().map(|(s, _)| *s).collect();
        let lens: Vec<usize> = parts.iter().map(|(_, ys)| ys.len()).collect();
        assert_eq!(starts, vec![0, 3, 5]);
        assert_eq!(lens, vec![3, 2, 1]);
    }
}
