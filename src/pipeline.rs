//! # Distributed multiply driver
//!
//! [`DistributedSpmv`] holds everything one rank needs to compute its rows of `y = A x`
//! over and over: the rewritten local matrix (and its CSB form, if selected), the shared
//! communication plan, the ghost exchanger with its buffers, the extended input vector,
//! the output vector and the kernel thread pool.
//!
//! A step is a ghost refresh followed by a local multiply. The two never overlap: the
//! kernel only starts once every ghost slot holds the owner's current value.

use num_traits::Num;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::comm::{or_abort, Communicator};
use crate::distributed::{resolve_ghosts, CommunicationPlan, ExtendedVector, GhostExchanger};
use crate::error::{try_zeroed, Result, SpmvError};
use crate::matrix::{multiply_csb, CsbMatrix, Layout, LocalMatrix, SpmvConfig};
use crate::parallel::multiply_csr;
use crate::partition::CyclicPartition;

/// Wall-clock split of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTiming {
    /// Time spent in the ghost refresh
    pub comm: Duration,
    /// Refresh plus multiply
    pub total: Duration,
}

/// One rank's state for repeated distributed multiplies.
pub struct DistributedSpmv<T> {
    config: SpmvConfig,
    pool: rayon::ThreadPool,
    matrix: LocalMatrix<T>,
    csb: Option<CsbMatrix<T>>,
    exchanger: GhostExchanger<T>,
    x: ExtendedVector<T>,
    y: Vec<T>,
}

impl<T> DistributedSpmv<T>
where
    T: Copy + Num + AddAssign + Default + Send + Sync + 'static,
{
    /// Resolves ghosts for `local` and allocates every persistent buffer.
    ///
    /// Collective. `local` holds this rank's rows in local row numbering with global
    /// column indices. The owned part of `x` starts zeroed; fill it through
    /// [`x_owned_mut`](Self::x_owned_mut) before stepping.
    pub fn setup<C: Communicator>(
        comm: &C,
        local: LocalMatrix<T>,
        n_global: usize,
        config: SpmvConfig,
    ) -> Result<Self> {
        let partition = CyclicPartition::new(comm.size())?;
        let expected_rows = partition.local_len(comm.rank(), n_global);
        let checked = config.build_pool().and_then(|pool| {
            if local.n_rows == expected_rows {
                Ok(pool)
            } else {
                Err(SpmvError::LengthMismatch {
                    what: "local row count",
                    expected: expected_rows,
                    actual: local.n_rows,
                })
            }
        });
        let pool = or_abort(comm, checked)?;

        let resolution = resolve_ghosts(comm, local, n_global, config.scratch)?;
        let matrix = resolution.matrix;
        let plan = Arc::new(resolution.plan);

        let csb = match config.layout {
            Layout::Csb => Some(matrix.to_csb()),
            Layout::Csr => None,
        };

        let buffers = GhostExchanger::new(Arc::clone(&plan)).and_then(|exchanger| {
            let x = ExtendedVector::zeros(&plan)?;
            let y = try_zeroed("output vector", matrix.n_rows, T::zero())?;
            Ok((exchanger, x, y))
        });
        let (exchanger, x, y) = or_abort(comm, buffers)?;

        info!(
            rank = comm.rank(),
            rows = matrix.n_rows,
            nnz = matrix.nnz(),
            layout = %config.layout,
            threads = config.n_threads,
            "rank ready"
        );

        Ok(Self {
            config,
            pool,
            matrix,
            csb,
            exchanger,
            x,
            y,
        })
    }

    /// Refreshes the ghost segment of `x` from the owners. Collective.
    ///
    /// The pack runs on this rank's kernel pool, so a rank never uses more than
    /// `config.n_threads` workers.
    pub fn refresh<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        self.exchanger.refresh_in(comm, &mut self.x, &self.pool)
    }

    /// Computes this rank's rows of `y` from the current extended `x`.
    pub fn multiply(&mut self) {
        let x = self.x.as_slice();
        let y = &mut self.y;
        let matrix = &self.matrix;
        let config = &self.config;

        match &self.csb {
            Some(csb) => {
                y.iter_mut().for_each(|v| *v = T::zero());
                self.pool.install(|| multiply_csb(csb, x, y));
            }
            None => self
                .pool
                .install(|| multiply_csr(matrix, x, y, config.schedule, config.chunk_size)),
        }
    }

    /// One timed refresh + multiply. Collective.
    pub fn step<C: Communicator>(&mut self, comm: &C) -> Result<StepTiming> {
        let start = Instant::now();
        self.refresh(comm)?;
        let after_comm = Instant::now();
        self.multiply();
        let end = Instant::now();

        Ok(StepTiming {
            comm: after_comm - start,
            total: end - start,
        })
    }

    pub fn plan(&self) -> &CommunicationPlan {
        self.exchanger.plan()
    }

    /// Local matrix in extended column numbering
    pub fn matrix(&self) -> &LocalMatrix<T> {
        &self.matrix
    }

    pub fn csb(&self) -> Option<&CsbMatrix<T>> {
        self.csb.as_ref()
    }

    pub fn config(&self) -> &SpmvConfig {
        &self.config
    }

    pub fn x(&self) -> &ExtendedVector<T> {
        &self.x
    }

    /// Owned entries of `x`, in local slot order
    pub fn x_owned_mut(&mut self) -> &mut [T] {
        self.x.owned_mut()
    }

    /// This rank's rows of the last product, in local row order
    pub fn y(&self) -> &[T] {
        &self.y
    }
}
