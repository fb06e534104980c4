//! Ghost refresh: filling the ghost segment from the owners' current values

use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;

use super::CommunicationPlan;
use crate::comm::{or_abort, Communicator};
use crate::error::{try_zeroed, Result, SpmvError};

/// A rank's owned vector entries followed by its ghost slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedVector<T> {
    values: Vec<T>,
    local_dim: usize,
}

impl<T: Copy + Default> ExtendedVector<T> {
    /// All-zero vector sized for `plan`
    pub fn zeros(plan: &CommunicationPlan) -> Result<Self> {
        Ok(Self {
            values: try_zeroed("extended vector", plan.extended_len(), T::default())?,
            local_dim: plan.local_dim,
        })
    }

    /// Extends the owned entries with zeroed ghost slots.
    pub fn from_owned(owned: &[T], plan: &CommunicationPlan) -> Result<Self> {
        if owned.len() != plan.local_dim {
            return Err(SpmvError::LengthMismatch {
                what: "owned vector segment",
                expected: plan.local_dim,
                actual: owned.len(),
            });
        }
        let mut values = try_zeroed("extended vector", plan.extended_len(), T::default())?;
        values[..owned.len()].copy_from_slice(owned);
        Ok(Self {
            values,
            local_dim: plan.local_dim,
        })
    }
}

impl<T> ExtendedVector<T> {
    pub fn owned(&self) -> &[T] {
        &self.values[..self.local_dim]
    }

    pub fn owned_mut(&mut self) -> &mut [T] {
        &mut self.values[..self.local_dim]
    }

    pub fn ghosts(&self) -> &[T] {
        &self.values[self.local_dim..]
    }

    /// The whole extended vector, as read by the local kernels
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reusable buffers for refreshing ghost values under one [`CommunicationPlan`].
///
/// The plan is shared; the buffers belong to this exchanger alone.
pub struct GhostExchanger<T> {
    plan: Arc<CommunicationPlan>,
    send_buffer: Vec<T>,
    recv_buffer: Vec<T>,
}

impl<T> GhostExchanger<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    pub fn new(plan: Arc<CommunicationPlan>) -> Result<Self> {
        let send_buffer = try_zeroed("ghost send buffer", plan.total_to_send(), T::default())?;
        let recv_buffer = try_zeroed("ghost receive buffer", plan.num_ghosts, T::default())?;
        Ok(Self {
            plan,
            send_buffer,
            recv_buffer,
        })
    }

    pub fn plan(&self) -> &CommunicationPlan {
        &self.plan
    }

    /// Overwrites every ghost slot of `x` with the owner's current value.
    ///
    /// Collective: every rank must call it, including ranks with nothing to send or
    /// receive. Owned entries are read, never written. The send buffer is packed on
    /// the current rayon pool.
    pub fn refresh<C: Communicator>(&mut self, comm: &C, x: &mut ExtendedVector<T>) -> Result<()> {
        self.exchange(comm, x, None)
    }

    /// Like [`refresh`](Self::refresh), but packs the send buffer on `pool`.
    pub fn refresh_in<C: Communicator>(
        &mut self,
        comm: &C,
        x: &mut ExtendedVector<T>,
        pool: &rayon::ThreadPool,
    ) -> Result<()> {
        self.exchange(comm, x, Some(pool))
    }

    fn exchange<C: Communicator>(
        &mut self,
        comm: &C,
        x: &mut ExtendedVector<T>,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<()> {
        let plan = &*self.plan;
        if x.local_dim != plan.local_dim || x.len() != plan.extended_len() {
            return or_abort(
                comm,
                Err(SpmvError::LengthMismatch {
                    what: "extended vector",
                    expected: plan.extended_len(),
                    actual: x.len(),
                }),
            );
        }

        // Pack
        let owned = x.owned();
        let send_buffer = &mut self.send_buffer;
        let mut pack = || {
            send_buffer
                .par_iter_mut()
                .zip(plan.export_indices.par_iter())
                .for_each(|(slot, &local)| *slot = owned[local])
        };
        match pool {
            Some(pool) => pool.install(pack),
            None => pack(),
        }

        comm.all_to_allv(
            &self.send_buffer,
            &plan.send_counts,
            &plan.send_displs,
            &mut self.recv_buffer,
            &plan.recv_counts,
            &plan.recv_displs,
        )?;

        // Ordinals are owner-grouped, so the receive buffer is already in slot order
        x.values[plan.local_dim..].copy_from_slice(&self.recv_buffer);

        trace!(
            rank = plan.rank,
            sent = plan.total_to_send(),
            received = plan.num_ghosts,
            "ghost refresh complete"
        );
        Ok(())
    }
}
