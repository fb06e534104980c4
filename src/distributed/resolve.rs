//! Ghost discovery and communication-plan negotiation
//!
//! A rank's rows reference columns owned by other ranks. Those foreign vector entries
//! ("ghosts") get slots after the rank's own entries in an extended local vector, and
//! the column indices of the local matrix are rewritten to point into it.
//!
//! Ghost ordinals are assigned owner-grouped: ascending owner rank, then ascending
//! global index within an owner. That is exactly the order in which an indexed
//! all-to-all delivers values (grouped by sender rank, in the order each sender was
//! asked), so the receive buffer maps onto the ghost segment slot for slot.

use num_traits::Num;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::comm::{or_abort, Communicator};
use crate::error::{try_zeroed, Result, SpmvError};
use crate::matrix::{LocalMatrix, ScratchStrategy};
use crate::partition::CyclicPartition;
use crate::utils::displacements;

/// What a rank exchanges with its peers on every ghost refresh.
///
/// Built once by [`resolve_ghosts`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunicationPlan {
    pub rank: usize,
    pub size: usize,

    /// Number of vector entries this rank owns
    pub local_dim: usize,

    /// Number of foreign entries this rank reads
    pub num_ghosts: usize,

    /// `send_counts[p]`: entries this rank supplies to rank `p`
    pub send_counts: Vec<usize>,
    /// `recv_counts[p]`: entries this rank requests from rank `p`
    pub recv_counts: Vec<usize>,
    pub send_displs: Vec<usize>,
    pub recv_displs: Vec<usize>,

    /// Local positions to pack, grouped by requesting rank in that rank's request order
    pub export_indices: Vec<usize>,

    /// Global index behind each ghost slot, in ordinal order
    pub ghost_globals: Vec<usize>,
}

impl CommunicationPlan {
    pub fn total_to_send(&self) -> usize {
        self.export_indices.len()
    }

    /// Length of the extended vector: owned entries followed by ghosts
    pub fn extended_len(&self) -> usize {
        self.local_dim + self.num_ghosts
    }

    /// True when this rank neither sends nor receives anything
    pub fn is_empty(&self) -> bool {
        self.num_ghosts == 0 && self.total_to_send() == 0
    }
}

/// A local matrix rewritten to the extended address space, with its plan.
#[derive(Clone)]
pub struct GhostResolution<T> {
    pub matrix: LocalMatrix<T>,
    pub plan: CommunicationPlan,
}

/// Ordinal lookup for ghost columns
enum GhostIndex {
    /// Remap table sized by the global dimension
    Dense(Vec<usize>),
    Sparse(HashMap<usize, usize>),
}

impl GhostIndex {
    fn build(ghosts: &[usize], n_global: usize, strategy: ScratchStrategy) -> Result<Self> {
        match strategy {
            ScratchStrategy::Sparse => Ok(GhostIndex::Sparse(
                ghosts.iter().enumerate().map(|(ord, &g)| (g, ord)).collect(),
            )),
            _ => {
                let mut remap = try_zeroed("ghost remap table", n_global, usize::MAX)?;
                for (ord, &g) in ghosts.iter().enumerate() {
                    remap[g] = ord;
                }
                Ok(GhostIndex::Dense(remap))
            }
        }
    }

    #[inline]
    fn ordinal(&self, global: usize) -> usize {
        match self {
            GhostIndex::Dense(remap) => remap[global],
            GhostIndex::Sparse(map) => map[&global],
        }
    }
}

/// Distinct foreign columns referenced by `cols`, in owner-grouped ordinal order.
fn discover_ghosts(
    cols: &[usize],
    partition: &CyclicPartition,
    rank: usize,
    n_global: usize,
    strategy: ScratchStrategy,
) -> Result<Vec<usize>> {
    let mut ghosts: Vec<usize> = match strategy {
        ScratchStrategy::Sparse => cols
            .iter()
            .copied()
            .filter(|&c| partition.owner(c) != rank)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        _ => {
            let mut present = try_zeroed("ghost presence array", n_global, false)?;
            for &c in cols {
                if partition.owner(c) != rank {
                    present[c] = true;
                }
            }
            present
                .iter()
                .enumerate()
                .filter_map(|(c, &p)| p.then_some(c))
                .collect()
        }
    };

    // Stable: ascending global order survives inside each owner group
    ghosts.sort_by_key(|&g| partition.owner(g));
    Ok(ghosts)
}

fn validate_columns<T>(matrix: &LocalMatrix<T>, n_global: usize) -> Result<()> {
    if matrix.row_ptr.len() != matrix.n_rows + 1 {
        return Err(SpmvError::LengthMismatch {
            what: "row_ptr",
            expected: matrix.n_rows + 1,
            actual: matrix.row_ptr.len(),
        });
    }
    match matrix.col_idx.iter().find(|&&c| c >= n_global) {
        Some(&col) => Err(SpmvError::ColumnOutOfRange { col, n_cols: n_global }),
        None => Ok(()),
    }
}

/// Translates the global indices peers asked `rank` for into local slots of its owned
/// segment. Any index this rank does not own fails the whole list.
fn export_slots(
    requested: &[usize],
    partition: &CyclicPartition,
    rank: usize,
    n_global: usize,
) -> Result<Vec<usize>> {
    requested
        .iter()
        .map(|&g| {
            if g < n_global && partition.owner(g) == rank {
                Ok(partition.local(g))
            } else {
                Err(SpmvError::MisroutedRequest { rank, global: g })
            }
        })
        .collect()
}

/// Discovers this rank's ghost columns, rewrites `matrix` into the extended local
/// address space and negotiates the communication plan with every peer.
///
/// Collective: every rank of `comm` must call it. `matrix` holds this rank's rows with
/// global column indices in `[0, n_global)`. Afterwards, column `c` owned here becomes
/// `local(c)` and a foreign column becomes `local_dim + ordinal(c)`.
///
/// Two collective rounds are used: an all-to-all of per-peer request counts, then an
/// indexed all-to-all of the requested global indices. A local input error aborts the
/// group so that no peer is left waiting.
pub fn resolve_ghosts<C, T>(
    comm: &C,
    mut matrix: LocalMatrix<T>,
    n_global: usize,
    scratch: ScratchStrategy,
) -> Result<GhostResolution<T>>
where
    C: Communicator,
    T: Copy + Num,
{
    let rank = comm.rank();
    let size = comm.size();
    let partition = CyclicPartition::new(size)?;

    or_abort(comm, validate_columns(&matrix, n_global))?;

    let local_dim = partition.local_len(rank, n_global);
    let strategy = scratch.resolve(n_global, matrix.nnz());

    // Presence scan and ordinal assignment
    let ghosts = or_abort(
        comm,
        discover_ghosts(&matrix.col_idx, &partition, rank, n_global, strategy),
    )?;
    let num_ghosts = ghosts.len();
    let index = or_abort(comm, GhostIndex::build(&ghosts, n_global, strategy))?;

    // Column rewrite
    for col in matrix.col_idx.iter_mut() {
        *col = if partition.owner(*col) == rank {
            partition.local(*col)
        } else {
            local_dim + index.ordinal(*col)
        };
    }
    matrix.n_cols = local_dim + num_ghosts;
    drop(index);

    // Count negotiation
    let mut recv_counts = vec![0usize; size];
    for &g in &ghosts {
        recv_counts[partition.owner(g)] += 1;
    }
    let send_counts = comm.all_to_all(&recv_counts)?;

    let (send_displs, total_to_send) = displacements(&send_counts);
    let (recv_displs, total_to_recv) = displacements(&recv_counts);
    debug_assert_eq!(total_to_recv, num_ghosts);

    debug!(
        rank,
        ?send_counts,
        ?recv_counts,
        "exchanged ghost request counts"
    );

    // Index negotiation: `ghosts` is already grouped by owner
    let mut requested = or_abort(comm, try_zeroed("export list", total_to_send, 0usize))?;
    comm.all_to_allv(
        &ghosts,
        &recv_counts,
        &recv_displs,
        &mut requested,
        &send_counts,
        &send_displs,
    )?;

    // Export list
    let export_indices = or_abort(
        comm,
        export_slots(&requested, &partition, rank, n_global),
    )?;

    info!(
        rank,
        local_dim,
        num_ghosts,
        total_to_send,
        scratch = %strategy,
        "communication plan ready"
    );

    Ok(GhostResolution {
        matrix,
        plan: CommunicationPlan {
            rank,
            size,
            local_dim,
            num_ghosts,
            send_counts,
            recv_counts,
            send_displs,
            recv_displs,
            export_indices,
            ghost_globals: ghosts,
        },
    })
}
