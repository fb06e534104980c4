//! # distspmv: distributed sparse matrix-vector multiplication
//!
//! Computes `y = A x` for a square sparse matrix whose rows, and the matching vector
//! entries, are spread cyclically over a group of ranks (`owner(i) = i mod P`).
//!
//! ## Overview
//!
//! Each rank multiplies only the rows it owns, but those rows reference vector entries
//! held by other ranks. The library:
//!
//! 1. **Resolves ghosts**: finds the foreign columns a rank reads, rewrites its column
//!    indices into an extended local address space and negotiates a reusable
//!    [`CommunicationPlan`] with every peer.
//! 2. **Refreshes ghosts**: before every multiply, one indexed all-to-all copies the
//!    owners' current values into the ghost segment of the [`ExtendedVector`].
//! 3. **Multiplies locally** with multithreaded kernels:
//!    - **CSR** with static, dynamic or guided row scheduling
//!    - **CSB** (square cache blocks) parallel over block-rows
//!
//! Ranks talk through the [`Communicator`] trait. [`LocalGroup`] runs a whole group
//! inside one process, one thread per rank.
//!
//! ## Usage
//!
//! ```
//! use distspmv::{
//!     scatter_rows, CooMatrix, Communicator, DistributedSpmv, LocalGroup, SpmvConfig,
//! };
//!
//! // 4x4 diagonal matrix, diag = 1, 2, 3, 4
//! let a = CooMatrix::with_entries(4, 4, (0..4).map(|i| (i, i, i as f64 + 1.0)).collect());
//!
//! let ys = LocalGroup::run(2, |comm| {
//!     let global = (comm.rank() == 0).then_some(&a);
//!     let (local, n) = scatter_rows(&comm, global).unwrap();
//!
//!     let config = SpmvConfig::default().with_threads(1);
//!     let mut spmv = DistributedSpmv::setup(&comm, local, n, config).unwrap();
//!     spmv.x_owned_mut().fill(1.0);
//!     spmv.step(&comm).unwrap();
//!     spmv.y().to_vec()
//! })
//! .unwrap();
//!
//! // rank 0 owns rows 0 and 2, rank 1 owns rows 1 and 3
//! assert_eq!(ys, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
//! ```

pub mod comm;
pub mod constants;
pub mod distributed;
pub mod error;
pub mod io;
pub mod matrix;
pub mod parallel;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod sweep;
pub mod utils;

// Re-export primary components
pub use comm::{Communicator, LocalComm, LocalGroup, SelfComm};
pub use distributed::{
    resolve_ghosts, scatter_rows, CommunicationPlan, ExtendedVector, GhostExchanger,
    GhostResolution,
};
pub use error::{Result, SpmvError};
pub use matrix::{
    block_size, multiply_csb, multiply_csb_seq, multiply_csb_with_threads, reference_spmv,
    CooMatrix, CsbMatrix, Layout, LocalMatrix, Schedule, ScratchStrategy, SparseMatrixCSR,
    SpmvConfig,
};
pub use parallel::multiply_csr;
pub use partition::CyclicPartition;
pub use pipeline::{DistributedSpmv, StepTiming};
pub use sweep::{run_sweep, SweepConfig};
pub use utils::{reference_spmv_sprs, to_sprs_csr};

/// Version information for the distspmv library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
