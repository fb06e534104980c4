// Matrix data structures and single-rank kernels

pub mod config;
pub mod coo;
pub mod conversion;
pub mod csb;
pub mod csr;
pub mod reference;

pub use config::{Layout, Schedule, ScratchStrategy, SpmvConfig};
pub use coo::CooMatrix;
pub use csb::{block_size, multiply_csb, multiply_csb_seq, multiply_csb_with_threads, CsbMatrix};
pub use csr::{LocalMatrix, SparseMatrixCSR};
pub use reference::reference_spmv;
