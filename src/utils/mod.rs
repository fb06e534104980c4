//! Utility functions and helpers

pub mod formats;

pub use formats::{reference_spmv_sprs, to_sprs_csr};

/// Computes an exclusive prefix sum (scan) for a vector
///
/// The result has one more entry than the input; its last entry is the total.
pub fn exclusive_scan(input: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(input.len() + 1);
    let mut sum = 0;

    result.push(0);

    for &val in input {
        sum += val;
        result.push(sum);
    }

    result
}

/// Splits a scan produced by [`exclusive_scan`] into per-entry offsets and the total.
pub fn displacements(counts: &[usize]) -> (Vec<usize>, usize) {
    let mut scan = exclusive_scan(counts);
    let total = scan.pop().unwrap_or(0);
    (scan, total)
}
