//! Error types shared by the partitioning, negotiation and kernel layers

use thiserror::Error;

/// Errors produced while building, distributing or multiplying a sparse matrix.
///
/// Input errors (`RowOutOfRange`, `ColumnOutOfRange`, `InvalidDimension`) are reported
/// before any collective starts. Everything raised from inside a collective is fatal
/// for the whole group: once a rank sees `NegotiationMismatch` the group is aborted and
/// every later collective returns `GroupAborted`.
#[derive(Debug, Error)]
pub enum SpmvError {
    #[error("row index {row} out of range for {n_rows} rows")]
    RowOutOfRange { row: usize, n_rows: usize },

    #[error("column index {col} out of range for {n_cols} columns")]
    ColumnOutOfRange { col: usize, n_cols: usize },

    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("rank {rank} is outside a group of {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("negotiation mismatch with rank {peer}: expected {expected} items, received {received}")]
    NegotiationMismatch {
        peer: usize,
        expected: usize,
        received: usize,
    },

    #[error("rank {rank} was asked for global index {global}, which it does not own")]
    MisroutedRequest { rank: usize, global: usize },

    #[error("rank {peer} posted a parcel of the wrong element type")]
    ParcelType { peer: usize },

    #[error("process group aborted by rank {0}")]
    GroupAborted(usize),

    #[error("failed to allocate {len} elements for {what}")]
    Allocation { what: &'static str, len: usize },

    #[error("rank {0} panicked")]
    RankPanicked(usize),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, SpmvError>;

/// Allocates a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Copy>(what: &'static str, len: usize, zero: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SpmvError::Allocation { what, len })?;
    buf.resize(len, zero);
    Ok(buf)
}

/// Empty buffer with room for `len` elements, or `Allocation` if the reservation fails.
pub(crate) fn try_with_capacity<T>(what: &'static str, len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SpmvError::Allocation { what, len })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = SpmvError::NegotiationMismatch { peer: 2, expected: 3, received: 1 };
        assert_eq!(
            err.to_string(),
            "negotiation mismatch with rank 2: expected 3 items, received 1"
        );
        assert_eq!(SpmvError::GroupAborted(1).to_string(), "process group aborted by rank 1");
    }

    #[test]
    fn test_try_zeroed() {
        let buf = try_zeroed("test buffer", 4, 0.0f64).unwrap();
        assert_eq!(buf, vec![0.0; 4]);
        assert!(try_zeroed("empty", 0, 0u8).unwrap().is_empty());
    }

    #[test]
    fn test_try_with_capacity() {
        let buf: Vec<u32> = try_with_capacity("indices", 16).unwrap();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);

        let huge = try_with_capacity::<u64>("indices", usize::MAX / 2);
        assert!(matches!(huge, Err(SpmvError::Allocation { what: "indices", .. })));
    }
}
