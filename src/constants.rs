//! Centralized constants for the distributed SpMV library
//!
//! Tunables used by the kernels, the ghost resolver and the benchmark driver live here
//! rather than scattered through the code.

// ============================================================================
// KERNEL SCHEDULING
// ============================================================================

/// Default number of rows per chunk for the CSR scheduling policies
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Divisor applied to the remaining rows per worker when sizing guided chunks
/// (`remaining / (GUIDED_DIVISOR * threads)`)
pub const GUIDED_DIVISOR: usize = 2;

/// Smallest CSB block edge
pub const MIN_CSB_BETA: usize = 1;

// ============================================================================
// GHOST RESOLUTION
// ============================================================================

/// `ScratchStrategy::Auto` switches to the sparse scratch tables when the global
/// dimension exceeds this multiple of the local nonzero count
pub const SPARSE_SCRATCH_RATIO: usize = 64;

/// Rank that owns the global matrix before scattering
pub const ROOT_RANK: usize = 0;

// ============================================================================
// BENCHMARK DRIVER
// ============================================================================

/// Default number of timed refresh+multiply repetitions
pub const DEFAULT_REPEATS: usize = 10;

/// Kernel calls averaged into one timing sample of the single-rank sweep
pub const DEFAULT_SWEEP_ITERATIONS: usize = 100;

/// Chunk sizes every CSR schedule is tried with in the single-rank sweep
pub const SWEEP_CHUNK_SIZES: [usize; 3] = [10, 100, 1000];

/// Percentile reported for timing samples
pub const REPORT_PERCENTILE: f64 = 0.90;

/// Relative spread of the nonzeros per synthetic row (`nnz_per_row / 5`)
pub const SYNTHETIC_VARIANCE_DIVISOR: usize = 5;

/// Seed multiplier for per-rank synthetic generation
pub const SYNTHETIC_SEED_MULTIPLIER: u64 = 12_345;

/// Seed offset for per-rank synthetic generation
pub const SYNTHETIC_SEED_OFFSET: u64 = 789;

/// Seed multiplier for the per-rank input vector
pub const VECTOR_SEED_MULTIPLIER: u64 = 1_234;
