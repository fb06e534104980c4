//! In-process process group: one OS thread per rank
//!
//! Every collective is a two-phase rendezvous on a shared barrier. In the post phase
//! each rank drops one parcel per destination into a `size × size` mailbox; in the
//! collect phase each rank takes the parcels addressed to it and validates them. The
//! second barrier keeps a fast rank from posting the next collective's parcels before
//! everyone has collected the current ones.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use tracing::{error, trace};

use super::{check_shape, Communicator};
use crate::error::{Result, SpmvError};

type Parcel = Box<dyn Any + Send>;

const NOT_ABORTED: usize = usize::MAX;

struct GroupState {
    size: usize,
    barrier: Barrier,
    /// Slot `src * size + dst` holds what `src` posted for `dst`
    mailbox: Vec<Mutex<Option<Parcel>>>,
    /// First rank that aborted, or `NOT_ABORTED`
    aborted_by: AtomicUsize,
}

impl GroupState {
    fn new(size: usize) -> Self {
        Self {
            size,
            barrier: Barrier::new(size),
            mailbox: (0..size * size).map(|_| Mutex::new(None)).collect(),
            aborted_by: AtomicUsize::new(NOT_ABORTED),
        }
    }

    fn slot(&self, src: usize, dst: usize) -> &Mutex<Option<Parcel>> {
        &self.mailbox[src * self.size + dst]
    }

    fn mark_aborted(&self, rank: usize) {
        let _ = self.aborted_by.compare_exchange(
            NOT_ABORTED,
            rank,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn aborted_by(&self) -> Option<usize> {
        match self.aborted_by.load(Ordering::SeqCst) {
            NOT_ABORTED => None,
            rank => Some(rank),
        }
    }
}

/// Holds every rank back until the launcher knows the whole group was spawned.
struct StartGate {
    go: Mutex<Option<bool>>,
    opened: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            go: Mutex::new(None),
            opened: Condvar::new(),
        }
    }

    fn open(&self, go: bool) {
        *self.go.lock() = Some(go);
        self.opened.notify_all();
    }

    /// Blocks until `open` is called and returns its verdict.
    fn wait(&self) -> bool {
        let mut go = self.go.lock();
        loop {
            if let Some(go) = *go {
                return go;
            }
            self.opened.wait(&mut go);
        }
    }
}

/// Launcher for an in-process group.
pub struct LocalGroup;

impl LocalGroup {
    /// Runs `f` once per rank, each on its own thread named `rank-<r>`, and returns the
    /// per-rank results in rank order.
    ///
    /// If a rank thread cannot be spawned, no rank runs `f` and the spawn error is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use distspmv::{Communicator, LocalGroup};
    ///
    /// let ranks = LocalGroup::run(3, |comm| comm.all_gather(comm.rank()).unwrap()).unwrap();
    /// assert_eq!(ranks, vec![vec![0, 1, 2]; 3]);
    /// ```
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        Self::launch(size, f, |_| Ok(()))
    }

    /// `run`, with `admit(rank)` consulted before each rank thread is spawned.
    fn launch<F, R, A>(size: usize, f: F, admit: A) -> Result<Vec<R>>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
        A: Fn(usize) -> std::io::Result<()>,
    {
        if size == 0 {
            return Err(SpmvError::InvalidDimension(
                "a process group needs at least one rank".to_string(),
            ));
        }

        let state = Arc::new(GroupState::new(size));
        let gate = StartGate::new();
        let f = &f;
        let gate = &gate;

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(size);
            let mut spawn_error = None;
            for rank in 0..size {
                let comm = LocalComm {
                    rank,
                    state: Arc::clone(&state),
                };
                let spawned = admit(rank).and_then(|_| {
                    std::thread::Builder::new()
                        .name(format!("rank-{}", rank))
                        .spawn_scoped(scope, move || gate.wait().then(|| f(comm)))
                });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        error!(rank, %err, "failed to spawn rank thread");
                        spawn_error = Some(err);
                        break;
                    }
                }
            }

            // Ranks already spawned must not enter a collective the missing ones never reach
            gate.open(spawn_error.is_none());

            let joined: Vec<_> = handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle.join() {
                    Ok(Some(output)) => Ok(output),
                    Ok(None) => Err(SpmvError::GroupAborted(rank)),
                    Err(_) => Err(SpmvError::RankPanicked(rank)),
                })
                .collect();

            match spawn_error {
                Some(err) => Err(err.into()),
                None => joined.into_iter().collect(),
            }
        })
    }
}

/// One rank's handle on a [`LocalGroup`].
pub struct LocalComm {
    rank: usize,
    state: Arc<GroupState>,
}

impl LocalComm {
    /// Posts `outgoing[dst]` for every destination (or nothing, when `None`), then collects
    /// the parcels addressed to this rank, running `accept` on each before the group
    /// leaves the rendezvous.
    fn rendezvous<T, F>(&self, outgoing: Option<Vec<T>>, mut accept: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnMut(usize, &T) -> Result<()>,
    {
        let state = &*self.state;
        if let Some(rank) = state.aborted_by() {
            return Err(SpmvError::GroupAborted(rank));
        }

        let posted = outgoing.is_some();
        if let Some(parcels) = outgoing {
            for (dst, parcel) in parcels.into_iter().enumerate() {
                *state.slot(self.rank, dst).lock() = Some(Box::new(parcel));
            }
        }

        state.barrier.wait();

        // The abort flag is only written between the two barriers, so every rank sees
        // the same value when it enters the next collective.
        if !posted {
            state.mark_aborted(self.rank);
        }

        let mut failure = None;
        let mut incoming = Vec::with_capacity(state.size);
        for src in 0..state.size {
            let parcel = state.slot(src, self.rank).lock().take();
            let result = match parcel.map(|p| p.downcast::<T>()) {
                Some(Ok(value)) => {
                    let value = *value;
                    accept(src, &value).map(|_| incoming.push(value))
                }
                Some(Err(_)) => Err(SpmvError::ParcelType { peer: src }),
                None => {
                    state.mark_aborted(src);
                    Err(SpmvError::GroupAborted(src))
                }
            };
            if let Err(err) = result {
                failure.get_or_insert(err);
            }
        }
        if failure.is_some() {
            state.mark_aborted(self.rank);
        }

        state.barrier.wait();

        if let Some(err) = failure {
            return Err(err);
        }
        match state.aborted_by() {
            Some(rank) => Err(SpmvError::GroupAborted(rank)),
            None => Ok(incoming),
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.state.size
    }

    fn barrier(&self) -> Result<()> {
        self.rendezvous(Some(vec![(); self.state.size]), |_, _| Ok(()))
            .map(|_| ())
    }

    fn all_to_all(&self, send: &[usize]) -> Result<Vec<usize>> {
        if send.len() != self.state.size {
            let err = SpmvError::LengthMismatch {
                what: "all_to_all send",
                expected: self.state.size,
                actual: send.len(),
            };
            self.abort(&err);
            return Err(err);
        }
        self.rendezvous(Some(send.to_vec()), |_, _| Ok(()))
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
        let size = self.state.size;
        let shape = check_shape("all_to_allv send", size, send.len(), send_counts, send_displs)
            .and_then(|_| {
                check_shape("all_to_allv recv", size, recv.len(), recv_counts, recv_displs)
            });
        if let Err(err) = shape {
            self.abort(&err);
            return Err(err);
        }

        let parcels: Vec<Vec<T>> = (0..size)
            .map(|p| send[send_displs[p]..send_displs[p] + send_counts[p]].to_vec())
            .collect();

        let incoming = self.rendezvous(Some(parcels), |src, chunk: &Vec<T>| {
            if chunk.len() == recv_counts[src] {
                Ok(())
            } else {
                Err(SpmvError::NegotiationMismatch {
                    peer: src,
                    expected: recv_counts[src],
                    received: chunk.len(),
                })
            }
        })?;

        for (src, chunk) in incoming.iter().enumerate() {
            recv[recv_displs[src]..recv_displs[src] + chunk.len()].copy_from_slice(chunk);
        }
        trace!(rank = self.rank, sent = send.len(), "all_to_allv complete");
        Ok(())
    }

    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        self.rendezvous(Some(vec![value; self.state.size]), |_, _| Ok(()))
    }

    fn abort(&self, reason: &SpmvError) {
        error!(rank = self.rank, %reason, "aborting process group");
        let _ = self.rendezvous::<(), _>(None, |_, _| Ok(()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_releases_spawned_ranks() {
        let calls = AtomicUsize::new(0);
        let result = LocalGroup::launch(
            4,
            |comm| {
                calls.fetch_add(1, Ordering::SeqCst);
                comm.barrier()
            },
            |rank| {
                if rank == 2 {
                    Err(std::io::Error::new(std::io::ErrorKind::Other, "no threads left"))
                } else {
                    Ok(())
                }
            },
        );

        assert!(matches!(result, Err(SpmvError::Io(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_gate() {
        let gate = StartGate::new();
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| gate.wait());
            gate.open(false);
            assert!(!waiter.join().unwrap());
        });
        assert!(!gate.wait());
    }

    #[test]
    fn test_all_to_all_transposes() {
        let results = LocalGroup::run(3, |comm| {
            let send: Vec<usize> = (0..3).map(|p| comm.rank() * 10 + p).collect();
            comm.all_to_all(&send).unwrap()
        })
        .unwrap();

        assert_eq!(results[0], vec![0, 10, 20]);
        assert_eq!(results[1], vec![1, 11, 21]);
        assert_eq!(results[2], vec![2, 12, 22]);
    }

    #[test]
    fn test_all_to_allv_variable_sizes() {
        // rank r sends r + 1 copies of (r, p) to every peer p
        let results = LocalGroup::run(3, |comm| {
            let r = comm.rank();
            let n = comm.size();
            let send_counts = vec![r + 1; n];
            let send_displs: Vec<usize> = (0..n).map(|p| p * (r + 1)).collect();
            let send: Vec<(usize, usize)> = (0..n)
                .flat_map(|p| std::iter::repeat((r, p)).take(r + 1))
                .collect();

            let recv_counts: Vec<usize> = (0..n).map(|p| p + 1).collect();
            let (recv_displs, total) = crate::utils::displacements(&recv_counts);
            let mut recv = vec![(0, 0); total];
            comm.all_to_allv(&send, &send_counts, &send_displs, &mut recv, &recv_counts, &recv_displs)
                .unwrap();
            recv
        })
        .unwrap();

        assert_eq!(results[1], vec![(0, 1), (1, 1), (1, 1), (2, 1), (2, 1), (2, 1)]);
    }

    #[test]
    fn test_mismatch_aborts_group() {
        let results = LocalGroup::run(2, |comm| {
            let send = [1.0, 2.0];
            // rank 1 expects two items from rank 0 but rank 0 only sends one
            let (send_counts, recv_counts) = if comm.rank() == 0 {
                (vec![1, 1], vec![1, 1])
            } else {
                (vec![1, 1], vec![2, 1])
            };
            let recv_displs = vec![0, recv_counts[0]];
            let mut recv = vec![0.0; 3];
            let first = comm.all_to_allv(&send, &send_counts, &[0, 1], &mut recv, &recv_counts, &recv_displs);
            let second = comm.barrier();
            (first.is_err(), second)
        })
        .unwrap();

        assert!(results.iter().all(|(failed, _)| *failed));
        assert!(results
            .iter()
            .all(|(_, after)| matches!(after, Err(SpmvError::GroupAborted(1)))));
    }

    #[test]
    fn test_abort_releases_peers() {
        let results = LocalGroup::run(3, |comm| {
            if comm.rank() == 2 {
                comm.abort(&SpmvError::InvalidDimension("bad input".to_string()));
                None
            } else {
                Some(comm.all_to_all(&[0, 0, 0]))
            }
        })
        .unwrap();

        assert!(results[2].is_none());
        for result in &results[..2] {
            assert!(matches!(result, Some(Err(SpmvError::GroupAborted(2)))));
        }
    }

    #[test]
    fn test_rank_panic_reported() {
        let result = LocalGroup::run(1, |_| panic!("boom"));
        assert!(matches!(result, Err(SpmvError::RankPanicked(0))));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(LocalGroup::run(0, |_| ()).is_err());
    }
}
