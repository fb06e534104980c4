//! Collective communication between the ranks of a process group
//!
//! Every operation here is a blocking rendezvous: all ranks of the group must call the
//! same collective, in the same order, with mutually consistent shapes. A rank that
//! skips a collective stalls the whole group; there are no timeouts and no
//! cancellation. Any inconsistency detected inside a collective aborts the group.

mod local;

pub use local::{LocalComm, LocalGroup};

use crate::error::{Result, SpmvError};

/// A member of a process group.
pub trait Communicator: Send {
    /// This process's rank, in `[0, size)`
    fn rank(&self) -> usize;

    /// Number of ranks in the group
    fn size(&self) -> usize;

    /// Returns once every rank has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Sends `send[p]` to rank `p` and returns the values received from every rank,
    /// indexed by sender.
    fn all_to_all(&self, send: &[usize]) -> Result<Vec<usize>>;

    /// Indexed all-to-all: `send[send_displs[p]..][..send_counts[p]]` goes to rank `p`,
    /// and what rank `p` sends here lands in `recv[recv_displs[p]..][..recv_counts[p]]`.
    ///
    /// Fails with `NegotiationMismatch` if a peer sends a different number of items than
    /// `recv_counts` declares for it.
    fn all_to_allv<T: Copy + Send + 'static>(
        &self,
        send: &[T],
        send_counts: &[usize],
        send_displs: &[usize],
        recv: &mut [T],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<()>;

    /// Collects one value from every rank, indexed by sender.
    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>>;

    /// Marks the group as failed after a local error.
    ///
    /// The caller takes part in the collective its peers are currently blocked in without
    /// contributing data, so those peers fail instead of waiting forever.
    fn abort(&self, reason: &SpmvError);
}

/// Aborts the group when `result` holds a local error, then passes it through.
pub(crate) fn or_abort<C: Communicator, T>(comm: &C, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        comm.abort(err);
    }
    result
}

/// Checks an indexed-exchange shape against a buffer and the group size.
pub(crate) fn check_shape(
    what: &'static str,
    size: usize,
    buf_len: usize,
    counts: &[usize],
    displs: &[usize],
) -> Result<()> {
    if counts.len() != size {
        return Err(SpmvError::LengthMismatch {
            what,
            expected: size,
            actual: counts.len(),
        });
    }
    if displs.len() != size {
        return Err(SpmvError::LengthMismatch {
            what,
            expected: size,
            actual: displs.len(),
        });
    }
    for (&count, &displ) in counts.iter().zip(displs) {
        if displ + count > buf_len {
            return Err(SpmvError::LengthMismatch {
                what,
                expected: displ + count,
                actual: buf_len,
            });
        }
    }
    Ok(())
}

/// A group of one: every collective is a local copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn all_to_all(&self, send: &[usize]) -> Result<Vec<usize>> {
        if send.len() != 1 {
            return Err(SpmvError::LengthMismatch {
                what: "all_to_all send",
                expected: 1,
                actual: send.len(),
            });
        }
        Ok(send.to_vec())
    }

    fn all_to_allv<T: Copy + Send + 'static>(
        &self,
        send: &[T],
        send_counts: &[usize],
        send_displs: &[usize],
        recv: &mut [T],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<()> {
        check_shape("all_to_allv send", 1, send.len(), send_counts, send_displs)?;
        check_shape("all_to_allv recv", 1, recv.len(), recv_counts, recv_displs)?;
        if send_counts[0] != recv_counts[0] {
            return Err(SpmvError::NegotiationMismatch {
                peer: 0,
                expected: recv_counts[0],
                received: send_counts[0],
            });
        }
        let n = send_counts[0];
        recv[recv_displs[0]..recv_displs[0] + n]
            .copy_from_slice(&send[send_displs[0]..send_displs[0] + n]);
        Ok(())
    }

    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        Ok(vec![value])
    }

    fn abort(&self, reason: &SpmvError) {
        tracing::error!(%reason, "aborting single-rank group");
    }
}
