//! Ghost resolution and refresh across in-process rank groups

use distspmv::{
    resolve_ghosts, Communicator, CyclicPartition, ExtendedVector, GhostExchanger, LocalGroup,
    ScratchStrategy, SparseMatrixCSR,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Random rows for `rank`, in local row numbering with global columns
fn random_local_rows(rank: usize, size: usize, n: usize, per_row: usize, seed: u64) -> SparseMatrixCSR<f64> {
    let p = CyclicPartition::new(size).unwrap();
    let mut rng = StdRng::seed_from_u64(seed + rank as u64);
    let rows = p.local_len(rank, n);
    let triples: Vec<_> = (0..rows)
        .flat_map(|r| (0..per_row).map(move |_| r))
        .map(|r| (r, rng.gen_range(0..n), 1.0))
        .collect();
    SparseMatrixCSR::from_triples(rows, n, triples).unwrap()
}

#[test]
fn test_rank_round_trip() {
    // Every ghost slot must end up holding its owner's rank number
    for size in [2, 3, 5] {
        for scratch in [ScratchStrategy::Dense, ScratchStrategy::Sparse] {
            let n = 53;
            let results = LocalGroup::run(size, |comm| {
                let rank = comm.rank();
                let local = random_local_rows(rank, size, n, 4, 7);
                let res = resolve_ghosts(&comm, local, n, scratch).unwrap();
                let plan = Arc::new(res.plan);

                let owned = vec![rank as f64; plan.local_dim];
                let mut x = ExtendedVector::from_owned(&owned, &plan).unwrap();
                let mut exchanger = GhostExchanger::new(Arc::clone(&plan)).unwrap();
                exchanger.refresh(&comm, &mut x).unwrap();

                (plan.ghost_globals.clone(), x.ghosts().to_vec(), x.owned().to_vec())
            })
            .unwrap();

            let p = CyclicPartition::new(size).unwrap();
            for (rank, (ghosts, values, owned)) in results.iter().enumerate() {
                assert!(owned.iter().all(|&v| v == rank as f64));
                assert_eq!(ghosts.len(), values.len());
                for (&g, &v) in ghosts.iter().zip(values) {
                    assert_ne!(p.owner(g), rank);
                    assert_eq!(v, p.owner(g) as f64, "P={} ghost {} on rank {}", size, g, rank);
                }
            }
        }
    }
}

#[test]
fn test_ghost_values_match_global_vector() {
    // Owned entries hold their global index; each ghost must read back its global index
    let size = 4;
    let n = 40;
    let results = LocalGroup::run(size, |comm| {
        let rank = comm.rank();
        let p = CyclicPartition::new(size).unwrap();
        let local = random_local_rows(rank, size, n, 6, 99);
        let res = resolve_ghosts(&comm, local, n, ScratchStrategy::Auto).unwrap();
        let plan = Arc::new(res.plan);

        let owned: Vec<f64> = p.owned_indices(rank, n).map(|g| g as f64).collect();
        let mut x = ExtendedVector::from_owned(&owned, &plan).unwrap();
        let mut exchanger = GhostExchanger::new(Arc::clone(&plan)).unwrap();

        // Refresh twice with changed owner values in between
        exchanger.refresh(&comm, &mut x).unwrap();
        let first = x.ghosts().to_vec();
        x.owned_mut().iter_mut().for_each(|v| *v = -*v);
        exchanger.refresh(&comm, &mut x).unwrap();

        (plan.ghost_globals.clone(), first, x.ghosts().to_vec())
    })
    .unwrap();

    for (ghosts, first, second) in &results {
        for ((&g, &a), &b) in ghosts.iter().zip(first).zip(second) {
            assert_eq!(a, g as f64);
            assert_eq!(b, -(g as f64));
        }
    }
}

#[test]
fn test_six_by_six_two_ranks() {
    // One nonzero at (2, 3): rank 0 owns row 2 (local row 1), column 3 lives on rank 1
    let results = LocalGroup::run(2, |comm| {
        let rank = comm.rank();
        let triples = if rank == 0 { vec![(1, 3, 1.0)] } else { vec![] };
        let local = SparseMatrixCSR::from_triples(3, 6, triples).unwrap();
        let res = resolve_ghosts(&comm, local, 6, ScratchStrategy::Dense).unwrap();
        let plan = Arc::new(res.plan);

        // rank 1's local slots hold 10, 11, 12
        let owned: Vec<f64> = (0..plan.local_dim).map(|i| (10 * rank + i) as f64).collect();
        let mut x = ExtendedVector::from_owned(&owned, &plan).unwrap();
        GhostExchanger::new(Arc::clone(&plan))
            .unwrap()
            .refresh(&comm, &mut x)
            .unwrap();
        (res.matrix, plan, x)
    })
    .unwrap();

    let (matrix, plan, x) = &results[0];
    assert_eq!(plan.local_dim, 3);
    assert_eq!(plan.num_ghosts, 1);
    assert_eq!(plan.ghost_globals, vec![3]);
    assert_eq!(plan.recv_counts, vec![0, 1]);
    assert_eq!(matrix.col_idx, vec![3]);
    // local index of global 3 on rank 1 is 3 / 2 = 1
    assert_eq!(x.as_slice()[plan.local_dim], 11.0);

    let (_, plan1, _) = &results[1];
    assert_eq!(plan1.send_counts, vec![1, 0]);
    assert_eq!(plan1.export_indices, vec![1]);
    assert_eq!(plan1.num_ghosts, 0);
}

#[test]
fn test_locally_owned_columns_need_no_exchange() {
    let size = 3;
    let n = 12;
    let results = LocalGroup::run(size, |comm| {
        let rank = comm.rank();
        let p = CyclicPartition::new(size).unwrap();
        // Row r only references columns owned by the same rank
        let rows = p.local_len(rank, n);
        let triples: Vec<_> = (0..rows)
            .map(|r| (r, p.global(rank, (r + 1) % rows), 2.0))
            .collect();
        let local = SparseMatrixCSR::from_triples(rows, n, triples).unwrap();
        let res = resolve_ghosts(&comm, local, n, ScratchStrategy::Auto).unwrap();
        let plan = Arc::new(res.plan);

        let owned = vec![1.5; plan.local_dim];
        let mut x = ExtendedVector::from_owned(&owned, &plan).unwrap();
        GhostExchanger::new(Arc::clone(&plan))
            .unwrap()
            .refresh(&comm, &mut x)
            .unwrap();
        (plan, x)
    })
    .unwrap();

    for (plan, x) in &results {
        assert_eq!(plan.num_ghosts, 0);
        assert!(plan.send_counts.iter().all(|&c| c == 0));
        assert!(plan.recv_counts.iter().all(|&c| c == 0));
        assert!(plan.is_empty());
        assert_eq!(x.as_slice(), &[1.5; 4]);
    }
}

#[test]
fn test_plan_counts_are_symmetric() {
    let size = 4;
    let n = 64;
    let plans = LocalGroup::run(size, |comm| {
        let local = random_local_rows(comm.rank(), size, n, 5, 3);
        resolve_ghosts(&comm, local, n, ScratchStrategy::Sparse).unwrap().plan
    })
    .unwrap();

    for (me, plan) in plans.iter().enumerate() {
        assert_eq!(plan.recv_counts.iter().sum::<usize>(), plan.num_ghosts);
        assert_eq!(plan.send_counts.iter().sum::<usize>(), plan.total_to_send());
        for (peer, other) in plans.iter().enumerate() {
            assert_eq!(plan.send_counts[peer], other.recv_counts[me]);
        }
    }
}

#[test]
fn test_dense_and_sparse_scratch_agree() {
    let size = 3;
    let n = 30;
    let run = |scratch| {
        LocalGroup::run(size, |comm| {
            let local = random_local_rows(comm.rank(), size, n, 3, 11);
            let res = resolve_ghosts(&comm, local, n, scratch).unwrap();
            (res.matrix.col_idx, res.plan)
        })
        .unwrap()
    };

    let dense = run(ScratchStrategy::Dense);
    let sparse = run(ScratchStrategy::Sparse);
    for ((dc, dp), (sc, sp)) in dense.iter().zip(&sparse) {
        assert_eq!(dc, sc);
        assert_eq!(dp, sp);
    }
}
