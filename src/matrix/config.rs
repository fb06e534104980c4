//! Configuration for the multiply kernels and the ghost resolver

use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_CHUNK_SIZE, SPARSE_SCRATCH_RATIO};
use crate::error::{Result, SpmvError};

/// How rows are distributed over the worker threads of the CSR kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Contiguous chunks assigned round-robin to workers up front
    Static,
    /// Chunks claimed by whichever worker is idle
    Dynamic,
    /// Chunks that shrink as the remaining row range is consumed
    Guided,
}

impl Schedule {
    pub const ALL: [Schedule; 3] = [Schedule::Static, Schedule::Dynamic, Schedule::Guided];
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Schedule::Static => "static",
            Schedule::Dynamic => "dynamic",
            Schedule::Guided => "guided",
        };
        f.write_str(name)
    }
}

impl FromStr for Schedule {
    type Err = SpmvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "static" | "0" => Ok(Schedule::Static),
            "dynamic" | "1" => Ok(Schedule::Dynamic),
            "guided" | "2" => Ok(Schedule::Guided),
            other => Err(SpmvError::InvalidDimension(format!("unknown schedule '{}'", other))),
        }
    }
}

/// In-memory layout the multiply runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Plain row-compressed storage
    Csr,
    /// Square cache blocks, parallel over block-rows
    Csb,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Csr => "csr",
            Layout::Csb => "csb",
        })
    }
}

impl FromStr for Layout {
    type Err = SpmvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csr" => Ok(Layout::Csr),
            "csb" => Ok(Layout::Csb),
            other => Err(SpmvError::InvalidDimension(format!("unknown layout '{}'", other))),
        }
    }
}

/// Scratch tables used while discovering ghost columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchStrategy {
    /// Presence and remap arrays sized by the global dimension
    Dense,
    /// Ordered set and hash map sized by the number of ghosts
    Sparse,
    /// Dense unless the global dimension dwarfs the local nonzero count
    Auto,
}

impl ScratchStrategy {
    /// Resolves `Auto` for a rank holding `nnz` nonzeros of an `n_global`-column matrix.
    pub fn resolve(self, n_global: usize, nnz: usize) -> ScratchStrategy {
        match self {
            ScratchStrategy::Auto => {
                if n_global > SPARSE_SCRATCH_RATIO.saturating_mul(nnz.max(1)) {
                    ScratchStrategy::Sparse
                } else {
                    ScratchStrategy::Dense
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for ScratchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScratchStrategy::Dense => "dense",
            ScratchStrategy::Sparse => "sparse",
            ScratchStrategy::Auto => "auto",
        })
    }
}

impl FromStr for ScratchStrategy {
    type Err = SpmvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dense" => Ok(ScratchStrategy::Dense),
            "sparse" => Ok(ScratchStrategy::Sparse),
            "auto" => Ok(ScratchStrategy::Auto),
            other => Err(SpmvError::InvalidDimension(format!(
                "unknown scratch strategy '{}'",
                other
            ))),
        }
    }
}

/// Configuration for one rank's share of the distributed multiply
#[derive(Debug, Clone)]
pub struct SpmvConfig {
    /// Number of kernel threads per rank
    pub n_threads: usize,

    /// Work distribution for the CSR kernel
    pub schedule: Schedule,

    /// Rows per chunk (minimum chunk for `Schedule::Guided`)
    pub chunk_size: usize,

    /// Layout used by the multiply
    pub layout: Layout,

    /// Scratch tables for ghost discovery
    pub scratch: ScratchStrategy,
}

impl Default for SpmvConfig {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(),
            schedule: Schedule::Static,
            chunk_size: DEFAULT_CHUNK_SIZE,
            layout: Layout::Csr,
            scratch: ScratchStrategy::Auto,
        }
    }
}

impl SpmvConfig {
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule, chunk_size: usize) -> Self {
        self.schedule = schedule;
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_scratch(mut self, scratch: ScratchStrategy) -> Self {
        self.scratch = scratch;
        self
    }

    /// Rejects settings no kernel can run with.
    pub fn validate(&self) -> Result<()> {
        if self.n_threads == 0 {
            return Err(SpmvError::InvalidDimension("n_threads must be > 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(SpmvError::InvalidDimension("chunk_size must be > 0".to_string()));
        }
        Ok(())
    }

    /// Builds the kernel thread pool for this configuration.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        self.validate()?;
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_threads)
            .build()?)
    }
}
