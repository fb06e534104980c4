//! Benchmark driver: repeated distributed `y = A x` over an in-process rank group
//!
//! Per-run timings go to stdout as CSV, followed by a one-line group summary. With
//! `--sweep` the driver instead times the single-rank kernels against a sequential
//! baseline, one CSV row per configuration. Logs go to stderr and are filtered with
//! `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use distspmv::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_REPEATS, DEFAULT_SWEEP_ITERATIONS, REPORT_PERCENTILE,
    SWEEP_CHUNK_SIZES,
};
use distspmv::io::{generate_local, read_matrix_market, seeded_vector};
use distspmv::report::{percentile, GroupSummary, KernelRecord, RankStats, RunRecord};
use distspmv::{
    run_sweep, scatter_rows, CooMatrix, Communicator, DistributedSpmv, Layout, LocalComm,
    LocalGroup, Result, Schedule, ScratchStrategy, SparseMatrixCSR, SpmvConfig, SpmvError,
    SweepConfig,
};

#[derive(Parser, Debug)]
#[command(name = "distspmv")]
#[command(author, version, about = "Distributed sparse matrix-vector multiply benchmark")]
struct Cli {
    #[command(subcommand)]
    source: Source,

    /// Number of ranks in the group
    #[arg(long, global = true, default_value_t = 1)]
    ranks: usize,

    /// Kernel threads per rank (default: available cores / ranks)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Timed refresh+multiply repetitions
    #[arg(long, global = true, default_value_t = DEFAULT_REPEATS)]
    repeats: usize,

    /// Local layout: csr or csb
    #[arg(long, global = true, default_value = "csr")]
    layout: Layout,

    /// CSR row schedule: static, dynamic or guided
    #[arg(long, global = true, default_value = "static")]
    schedule: Schedule,

    /// Rows per chunk for the CSR schedules
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Ghost discovery scratch tables: dense, sparse or auto
    #[arg(long, global = true, default_value = "auto")]
    scratch: ScratchStrategy,

    /// Time the single-rank kernels against a sequential baseline instead
    #[arg(long, global = true)]
    sweep: bool,

    /// Chunk sizes every schedule is swept over
    #[arg(long, global = true, value_delimiter = ',', default_values_t = SWEEP_CHUNK_SIZES.to_vec())]
    sweep_chunks: Vec<usize>,

    /// Kernel calls averaged into one sweep sample
    #[arg(long, global = true, default_value_t = DEFAULT_SWEEP_ITERATIONS)]
    iterations: usize,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Read a Matrix Market file on rank 0 and scatter its rows
    Matrix {
        /// Path to a .mtx file
        path: PathBuf,
    },

    /// Generate a random matrix with a fixed number of rows per rank (weak scaling)
    Synthetic {
        #[arg(long)]
        rows_per_rank: usize,

        #[arg(long)]
        nnz_per_row: usize,
    },
}

/// What one rank hands back to the driver
struct RankOutput {
    records: Vec<RunRecord>,
    group: Vec<RankStats>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!(%err, "benchmark failed");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.ranks == 0 || cli.repeats == 0 {
        return Err(SpmvError::InvalidDimension(
            "--ranks and --repeats must be at least 1".to_string(),
        ));
    }

    let threads = cli
        .threads
        .unwrap_or_else(|| (num_cpus::get() / cli.ranks).max(1));
    let config = SpmvConfig::default()
        .with_threads(threads)
        .with_schedule(cli.schedule, cli.chunk_size)
        .with_layout(cli.layout)
        .with_scratch(cli.scratch);
    config.validate()?;

    if cli.sweep {
        return sweep_kernels(cli, threads);
    }

    let (name, global) = match &cli.source {
        Source::Matrix { path } => (matrix_name(path), Some(read_matrix_market(path)?)),
        Source::Synthetic { .. } => (format!("synthetic_np{}", cli.ranks), None),
    };

    info!(
        matrix = %name,
        ranks = cli.ranks,
        threads,
        layout = %cli.layout,
        schedule = %cli.schedule,
        "starting benchmark"
    );

    let outputs = LocalGroup::run(cli.ranks, |comm| {
        run_rank(&comm, cli, &config, &name, global.as_ref())
    })?;
    let outputs = first_failure(outputs)?;

    println!("{}", RunRecord::CSV_HEADER);
    for output in &outputs {
        for record in &output.records {
            println!("{}", record.to_csv());
        }
    }

    if let Some(summary) = outputs
        .first()
        .and_then(|root| GroupSummary::from_ranks(&name, &root.group))
    {
        println!();
        println!("{}", GroupSummary::CSV_HEADER);
        println!("{}", summary.to_csv());
    }
    Ok(())
}

/// Single-rank sweep over every schedule and chunk size, plus both CSB kernels.
fn sweep_kernels(cli: &Cli, threads: usize) -> Result<()> {
    if cli.ranks != 1 {
        return Err(SpmvError::InvalidDimension(
            "--sweep runs on a single rank; drop --ranks".to_string(),
        ));
    }

    let (name, a) = match &cli.source {
        Source::Matrix { path } => {
            let coo = read_matrix_market(path)?;
            (
                matrix_name(path),
                SparseMatrixCSR::from_triples(coo.n_rows, coo.n_cols, coo.entries)?,
            )
        }
        Source::Synthetic {
            rows_per_rank,
            nnz_per_row,
        } => {
            let (a, _) = generate_local(0, 1, *rows_per_rank, *nnz_per_row)?;
            ("synthetic".to_string(), a)
        }
    };
    let x = seeded_vector(0, a.n_cols);

    let config = SweepConfig {
        threads,
        runs: cli.repeats,
        iterations: cli.iterations,
        chunk_sizes: cli.sweep_chunks.clone(),
        ..SweepConfig::default()
    };
    let records = run_sweep(&name, &a, &x, &config)?;

    println!("{}", KernelRecord::CSV_HEADER);
    for record in &records {
        println!("{}", record.to_csv());
    }
    Ok(())
}

fn matrix_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reports the error that started a group failure rather than a peer's `GroupAborted`.
fn first_failure(outputs: Vec<Result<RankOutput>>) -> Result<Vec<RankOutput>> {
    if let Some(pos) = outputs
        .iter()
        .position(|o| matches!(o, Err(e) if !matches!(e, SpmvError::GroupAborted(_))))
    {
        return match outputs.into_iter().nth(pos) {
            Some(Err(err)) => Err(err),
            _ => Err(SpmvError::GroupAborted(pos)),
        };
    }
    outputs.into_iter().collect()
}

fn run_rank(
    comm: &LocalComm,
    cli: &Cli,
    config: &SpmvConfig,
    name: &str,
    global: Option<&CooMatrix<f64>>,
) -> Result<RankOutput> {
    let rank = comm.rank();
    let size = comm.size();

    let (local, n_global) = match &cli.source {
        Source::Matrix { .. } => scatter_rows(comm, global.filter(|_| rank == 0))?,
        Source::Synthetic {
            rows_per_rank,
            nnz_per_row,
        } => generate_local(rank, size, *rows_per_rank, *nnz_per_row)?,
    };

    let mut spmv = DistributedSpmv::setup(comm, local, n_global, config.clone())?;
    let x = seeded_vector(rank, spmv.plan().local_dim);
    spmv.x_owned_mut().copy_from_slice(&x);

    // Warm-up
    spmv.step(comm)?;
    comm.barrier()?;

    let mut records = Vec::with_capacity(cli.repeats);
    for run in 0..cli.repeats {
        comm.barrier()?;
        let timing = spmv.step(comm)?;
        records.push(RunRecord {
            matrix_name: name.to_string(),
            rank,
            num_procs: size,
            run,
            elapsed_time: timing.total.as_secs_f64(),
            comm_time: timing.comm.as_secs_f64(),
            local_nz: spmv.matrix().nnz(),
            ghost_entries: spmv.plan().num_ghosts,
        });
    }

    let totals: Vec<f64> = records.iter().map(|r| r.elapsed_time).collect();
    let stats = RankStats {
        local_nz: spmv.matrix().nnz(),
        num_ghosts: spmv.plan().num_ghosts,
        p90: percentile(&totals, REPORT_PERCENTILE).unwrap_or(0.0),
    };
    let group = comm.all_gather(stats)?;

    Ok(RankOutput { records, group })
}
