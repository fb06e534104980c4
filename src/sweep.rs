//! Single-rank kernel sweep
//!
//! Times the sequential CSR product as a baseline, then every CSR schedule at every
//! chunk size on a fixed-size pool, and optionally the CSB layout both ways. Each
//! configuration is reported as the p90 of its per-run mean call time, with speedup and
//! efficiency against the sequential CSR baseline.

use std::time::Instant;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_REPEATS, DEFAULT_SWEEP_ITERATIONS, REPORT_PERCENTILE, SWEEP_CHUNK_SIZES,
};
use crate::error::{try_zeroed, Result, SpmvError};
use crate::matrix::{multiply_csb, multiply_csb_seq, reference_spmv, Schedule, SparseMatrixCSR};
use crate::parallel::multiply_csr;
use crate::report::{percentile, speedup, KernelRecord};

/// What the sweep tries and how long it measures each configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Workers for the parallel kernels
    pub threads: usize,
    /// Timing samples per configuration
    pub runs: usize,
    /// Kernel calls averaged into one sample
    pub iterations: usize,
    pub schedules: Vec<Schedule>,
    pub chunk_sizes: Vec<usize>,
    /// Also time the CSB layout
    pub include_csb: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            runs: DEFAULT_REPEATS,
            iterations: DEFAULT_SWEEP_ITERATIONS,
            schedules: Schedule::ALL.to_vec(),
            chunk_sizes: SWEEP_CHUNK_SIZES.to_vec(),
            include_csb: true,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 || self.runs == 0 || self.iterations == 0 {
            return Err(SpmvError::InvalidDimension(
                "sweep threads, runs and iterations must be > 0".to_string(),
            ));
        }
        if self.chunk_sizes.contains(&0) {
            return Err(SpmvError::InvalidDimension("chunk sizes must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Runs `kernel` `iterations` times per run, zeroing `y` before every call.
///
/// Returns the mean seconds per call of each run and the sum of `y` after the last call.
pub fn time_kernel<F>(
    y: &mut [f64],
    runs: usize,
    iterations: usize,
    mut kernel: F,
) -> (Vec<f64>, f64)
where
    F: FnMut(&mut [f64]),
{
    let mut means = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut elapsed = 0.0;
        for _ in 0..iterations {
            y.iter_mut().for_each(|v| *v = 0.0);
            let start = Instant::now();
            kernel(&mut *y);
            elapsed += start.elapsed().as_secs_f64();
        }
        means.push(elapsed / iterations.max(1) as f64);
    }
    (means, y.iter().sum())
}

/// Times every configuration of `config` on `a` and `x`.
///
/// The first record is always the sequential CSR baseline.
pub fn run_sweep(
    matrix_name: &str,
    a: &SparseMatrixCSR<f64>,
    x: &[f64],
    config: &SweepConfig,
) -> Result<Vec<KernelRecord>> {
    config.validate()?;
    if x.len() < a.n_cols {
        return Err(SpmvError::LengthMismatch {
            what: "sweep input vector",
            expected: a.n_cols,
            actual: x.len(),
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    let mut y = try_zeroed("sweep output vector", a.n_rows, 0.0f64)?;
    let (runs, iterations) = (config.runs, config.iterations);

    let p90 = |samples: &[f64]| percentile(samples, REPORT_PERCENTILE).unwrap_or(0.0);

    info!(
        matrix = matrix_name,
        rows = a.n_rows,
        nnz = a.nnz(),
        threads = config.threads,
        "starting kernel sweep"
    );

    let (samples, checksum) = time_kernel(&mut y, runs, iterations, |y| reference_spmv(a, x, y));
    let p90_seq = p90(&samples);
    let record = |kernel: &'static str,
                  schedule: Option<Schedule>,
                  chunk_size: Option<usize>,
                  threads: usize,
                  time: f64,
                  checksum: f64| {
        debug!(kernel, ?schedule, ?chunk_size, p90 = time, "configuration timed");
        KernelRecord {
            matrix_name: matrix_name.to_string(),
            kernel,
            schedule: schedule.map(|s| s.to_string()),
            chunk_size,
            threads,
            p90: time,
            speedup: speedup(p90_seq, time),
            checksum,
        }
    };

    let mut records = vec![record("csr_seq", None, None, 1, p90_seq, checksum)];

    for &schedule in &config.schedules {
        for &chunk in &config.chunk_sizes {
            let (samples, checksum) = time_kernel(&mut y, runs, iterations, |y| {
                pool.install(|| multiply_csr(a, x, y, schedule, chunk))
            });
            records.push(record(
                "csr",
                Some(schedule),
                Some(chunk),
                config.threads,
                p90(&samples),
                checksum,
            ));
        }
    }

    if config.include_csb {
        let csb = a.to_csb();

        let (samples, checksum) =
            time_kernel(&mut y, runs, iterations, |y| multiply_csb_seq(&csb, x, y));
        records.push(record("csb_seq", None, None, 1, p90(&samples), checksum));

        let (samples, checksum) = time_kernel(&mut y, runs, iterations, |y| {
            pool.install(|| multiply_csb(&csb, x, y))
        });
        records.push(record("csb", None, None, config.threads, p90(&samples), checksum));
    }

    Ok(records)
}
