//! Root-to-all distribution of a global matrix by row owner

use num_traits::Num;
use tracing::{debug, info};

use crate::comm::{or_abort, Communicator};
use crate::constants::ROOT_RANK;
use crate::error::{try_zeroed, Result, SpmvError};
use crate::matrix::{CooMatrix, LocalMatrix};
use crate::partition::CyclicPartition;
use crate::utils::displacements;

fn check_root_input<T>(coo: Option<&CooMatrix<T>>) -> Result<(usize, usize)> {
    let coo = coo.ok_or_else(|| {
        SpmvError::InvalidDimension("the root rank must supply the global matrix".to_string())
    })?;
    if coo.n_rows != coo.n_cols {
        return Err(SpmvError::InvalidDimension(format!(
            "matrix must be square, got {}x{}",
            coo.n_rows, coo.n_cols
        )));
    }
    coo.validate()?;
    Ok((coo.n_rows, coo.nnz()))
}

/// Hands every rank the rows it owns under the cyclic partition.
///
/// Collective. Only the root rank (rank 0) reads `global`; the other ranks pass `None`.
/// Returns this rank's rows, renumbered to local row indices but still carrying global
/// column indices, together with the global dimension `N`. The root rejects a
/// non-square or out-of-range matrix and aborts the group.
pub fn scatter_rows<C, T>(comm: &C, global: Option<&CooMatrix<T>>) -> Result<(LocalMatrix<T>, usize)>
where
    C: Communicator,
    T: Copy + Num + Send + Sync + 'static,
{
    let rank = comm.rank();
    let size = comm.size();
    let partition = CyclicPartition::new(size)?;

    // Root validates, then everyone learns N
    let root_info = if rank == ROOT_RANK {
        Some(or_abort(comm, check_root_input(global))?)
    } else {
        None
    };
    let (n_global, total_nnz) = comm
        .all_gather(root_info)?
        .get(ROOT_RANK)
        .copied()
        .flatten()
        .ok_or_else(|| SpmvError::InvalidDimension("root sent no matrix dimensions".to_string()))?;

    // Root buckets its entries by owning rank, keeping input order inside a bucket
    let (outgoing, send_counts) = match global.filter(|_| rank == ROOT_RANK) {
        Some(coo) => {
            let mut counts = vec![0usize; size];
            for &(row, _, _) in &coo.entries {
                counts[partition.owner(row)] += 1;
            }
            let (mut cursor, _) = displacements(&counts);
            let mut bucketed = or_abort(
                comm,
                try_zeroed("scatter send buffer", coo.nnz(), (0, 0, T::zero())),
            )?;
            for &entry in &coo.entries {
                let dst = partition.owner(entry.0);
                bucketed[cursor[dst]] = entry;
                cursor[dst] += 1;
            }
            (bucketed, counts)
        }
        None => (Vec::new(), vec![0usize; size]),
    };

    let recv_counts = comm.all_to_all(&send_counts)?;
    let (send_displs, _) = displacements(&send_counts);
    let (recv_displs, total_recv) = displacements(&recv_counts);

    let mut incoming = or_abort(
        comm,
        try_zeroed("scatter receive buffer", total_recv, (0, 0, T::zero())),
    )?;
    comm.all_to_allv(
        &outgoing,
        &send_counts,
        &send_displs,
        &mut incoming,
        &recv_counts,
        &recv_displs,
    )?;
    drop(outgoing);

    debug!(rank, received = total_recv, "received owned rows");

    let local_rows = partition.local_len(rank, n_global);
    let matrix = or_abort(
        comm,
        LocalMatrix::from_triples(
            local_rows,
            n_global,
            incoming
                .into_iter()
                .map(|(row, col, val)| (partition.local(row), col, val)),
        ),
    )?;

    if rank == ROOT_RANK {
        info!(n_global, total_nnz, ranks = size, "matrix scattered");
    }
    Ok((matrix, n_global))
}
