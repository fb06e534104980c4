//! End-to-end: scatter, resolve, refresh and multiply against a global reference

use distspmv::io::{generate_local, parse_matrix_market};
use distspmv::{
    reference_spmv, scatter_rows, CooMatrix, Communicator, CyclicPartition, DistributedSpmv,
    Layout, LocalGroup, Schedule, SparseMatrixCSR, SpmvConfig, SpmvError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;

fn random_coo(n: usize, nnz: usize, seed: u64) -> CooMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let entries = (0..nnz)
        .map(|_| (rng.gen_range(0..n), rng.gen_range(0..n), rng.gen_range(-1.0f64..1.0)))
        .collect();
    CooMatrix::with_entries(n, n, entries)
}

fn global_product(coo: &CooMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let a = SparseMatrixCSR::from_triples(coo.n_rows, coo.n_cols, coo.entries.clone()).unwrap();
    let mut y = vec![0.0; coo.n_rows];
    reference_spmv(&a, x, &mut y);
    y
}

/// Runs one distributed multiply and reassembles the global `y`
fn distributed_product(coo: &CooMatrix<f64>, x: &[f64], size: usize, config: SpmvConfig) -> Vec<f64> {
    let n = coo.n_rows;
    let parts = LocalGroup::run(size, |comm| {
        let rank = comm.rank();
        let p = CyclicPartition::new(size).unwrap();
        let (local, n_global) = scatter_rows(&comm, (rank == 0).then_some(coo)).unwrap();

        let mut spmv = DistributedSpmv::setup(&comm, local, n_global, config.clone()).unwrap();
        for (slot, g) in spmv.x_owned_mut().iter_mut().zip(p.owned_indices(rank, n)) {
            *slot = x[g];
        }
        // Two steps: the second must see the same ghosts as the first
        spmv.step(&comm).unwrap();
        spmv.step(&comm).unwrap();
        spmv.y().to_vec()
    })
    .unwrap();

    let p = CyclicPartition::new(size).unwrap();
    (0..n).map(|i| parts[p.owner(i)][p.local(i)]).collect()
}

fn assert_close(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= 1e-12 * x.abs().max(1.0), "row {}: {} vs {}", i, x, y);
    }
}

#[test]
fn test_csr_matches_global_reference() {
    let n = 97;
    let coo = random_coo(n, 600, 21);
    let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
    let expected = global_product(&coo, &x);

    for size in [1, 2, 3, 4, 7] {
        for schedule in Schedule::ALL {
            let config = SpmvConfig::default()
                .with_threads(2)
                .with_schedule(schedule, 5);
            let y = distributed_product(&coo, &x, size, config);
            // Rows keep their input entry order through the scatter, so sums match exactly
            assert_eq!(y, expected, "P={} {}", size, schedule);
        }
    }
}

#[test]
fn test_csb_matches_global_reference() {
    let n = 80;
    let coo = random_coo(n, 500, 4);
    let x: Vec<f64> = (0..n).map(|i| 1.0 / (i as f64 + 1.0)).collect();
    let expected = global_product(&coo, &x);

    for size in [1, 3, 5] {
        let config = SpmvConfig::default().with_threads(3).with_layout(Layout::Csb);
        assert_close(&distributed_product(&coo, &x, size, config), &expected);
    }
}

#[test]
fn test_more_ranks_than_rows() {
    let coo = CooMatrix::with_entries(3, 3, vec![(0, 2, 1.0), (1, 0, 2.0), (2, 1, 3.0), (2, 2, 4.0)]);
    let x = [1.0, 10.0, 100.0];
    let expected = global_product(&coo, &x);
    assert_eq!(expected, vec![100.0, 2.0, 430.0]);

    let config = SpmvConfig::default().with_threads(1);
    assert_eq!(distributed_product(&coo, &x, 5, config), expected);
}

#[test]
fn test_matrix_market_symmetric_end_to_end() {
    let text = "%%MatrixMarket matrix coordinate real symmetric\n\
                4 4 5\n\
                1 1 4.0\n\
                2 1 -1.0\n\
                3 2 -1.0\n\
                4 3 -1.0\n\
                4 4 4.0\n";
    let coo = parse_matrix_market(Cursor::new(text)).unwrap();
    assert_eq!(coo.nnz(), 8);

    let x = [1.0, 1.0, 1.0, 1.0];
    let config = SpmvConfig::default().with_threads(1);
    assert_eq!(distributed_product(&coo, &x, 2, config), vec![3.0, -2.0, -2.0, 3.0]);
}

#[test]
fn test_synthetic_weak_scaling_runs() {
    let size = 3;
    let rows_per_rank = 40;
    let results = LocalGroup::run(size, |comm| {
        let (local, n) = generate_local(comm.rank(), size, rows_per_rank, 6).unwrap();
        let nnz = local.nnz();
        let config = SpmvConfig::default().with_threads(2).with_layout(Layout::Csb);
        let mut spmv = DistributedSpmv::setup(&comm, local, n, config).unwrap();
        spmv.x_owned_mut().fill(1.0);
        spmv.step(&comm).unwrap();

        // With x = 1 every row sum equals the row's value sum
        let a = spmv.matrix();
        let row_sums: Vec<f64> = (0..a.n_rows).map(|i| a.row_iter(i).map(|(_, v)| *v).sum()).collect();
        (n, nnz, spmv.y().to_vec(), row_sums, spmv.plan().local_dim)
    })
    .unwrap();

    for (n, nnz, y, row_sums, local_dim) in &results {
        assert_eq!(*n, size * rows_per_rank);
        assert_eq!(*local_dim, rows_per_rank);
        assert!(*nnz > 0);
        for (a, b) in y.iter().zip(row_sums) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}

#[test]
fn test_non_square_matrix_rejected() {
    let coo = CooMatrix::with_entries(3, 4, vec![(0, 3, 1.0)]);
    let results = LocalGroup::run(2, |comm| {
        scatter_rows(&comm, (comm.rank() == 0).then_some(&coo)).map(|_| ())
    })
    .unwrap();
    assert!(matches!(results[0], Err(SpmvError::InvalidDimension(_))));
    assert!(matches!(results[1], Err(SpmvError::GroupAborted(0))));
}
