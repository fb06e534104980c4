//! Seeded random matrices and vectors for weak-scaling runs
//!
//! Each rank generates its own rows independently, so the global matrix grows with the
//! group while the per-rank work stays fixed.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use crate::constants::{
    SYNTHETIC_SEED_MULTIPLIER, SYNTHETIC_SEED_OFFSET, SYNTHETIC_VARIANCE_DIVISOR,
    VECTOR_SEED_MULTIPLIER,
};
use crate::error::{try_with_capacity, Result, SpmvError};
use crate::matrix::LocalMatrix;

/// Generates the rows owned by `rank` of a square `rows_per_rank * size` matrix.
///
/// Every row gets `nnz_per_row ± nnz_per_row / 5` distinct random columns (the spread is
/// at least one), clamped to `[1, N]`, with values uniform in `[-1, 1)`. Output is
/// deterministic for a given `(rank, size, rows_per_rank, nnz_per_row)`.
///
/// Returns the local rows, in local row numbering with global columns, and `N`.
pub fn generate_local(
    rank: usize,
    size: usize,
    rows_per_rank: usize,
    nnz_per_row: usize,
) -> Result<(LocalMatrix<f64>, usize)> {
    if rank >= size {
        return Err(SpmvError::InvalidRank { rank, size });
    }
    if rows_per_rank == 0 {
        return Err(SpmvError::InvalidDimension(
            "synthetic matrix needs at least one row per rank".to_string(),
        ));
    }
    let n_global = rows_per_rank.checked_mul(size).ok_or_else(|| {
        SpmvError::InvalidDimension(format!(
            "{} rows per rank over {} ranks overflows the global dimension",
            rows_per_rank, size
        ))
    })?;

    let seed = rank as u64 * SYNTHETIC_SEED_MULTIPLIER + SYNTHETIC_SEED_OFFSET;
    let mut rng = StdRng::seed_from_u64(seed);
    let variance = (nnz_per_row / SYNTHETIC_VARIANCE_DIVISOR).max(1);
    let low = nnz_per_row.saturating_sub(variance);
    let high = nnz_per_row.saturating_add(variance);

    // No row holds more than N distinct columns
    let per_row_max = high.min(n_global);
    let capacity = rows_per_rank.checked_mul(per_row_max).ok_or_else(|| {
        SpmvError::InvalidDimension(format!(
            "{} rows of up to {} entries overflow the local nonzero count",
            rows_per_rank, per_row_max
        ))
    })?;

    let mut row_ptr =
        try_with_capacity("synthetic row pointers", rows_per_rank.saturating_add(1))?;
    let mut col_idx = try_with_capacity("synthetic column indices", capacity)?;
    let mut values: Vec<f64> = try_with_capacity("synthetic values", capacity)?;
    row_ptr.push(0);

    for _ in 0..rows_per_rank {
        let row_nnz = rng.gen_range(low..=high).clamp(1, n_global);

        for col in sample(&mut rng, n_global, row_nnz).into_iter() {
            col_idx.push(col);
            values.push(rng.gen_range(-1.0..1.0));
        }
        row_ptr.push(col_idx.len());
    }

    Ok((
        LocalMatrix::new(rows_per_rank, n_global, row_ptr, col_idx, values),
        n_global,
    ))
}

/// Uniform `[-1, 1)` values for `rank`'s owned vector entries.
pub fn seeded_vector(rank: usize, len: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(rank as u64 * VECTOR_SEED_MULTIPLIER);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}
