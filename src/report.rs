//! Timing records, scaling metrics and group-wide summaries for the benchmark driver

/// `q`-quantile of `samples` (`q` in `[0, 1]`) with linear interpolation between the two
/// nearest order statistics. Returns `None` for an empty sample.
pub fn percentile(samples: &[f64], q: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let index = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let weight = index - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

/// `sequential / parallel` time ratio. `None` unless both times are positive.
pub fn speedup(sequential: f64, parallel: f64) -> Option<f64> {
    (sequential > 0.0 && parallel > 0.0).then(|| sequential / parallel)
}

/// Speedup per thread; 1.0 is perfect scaling.
pub fn efficiency(speedup: f64, threads: usize) -> f64 {
    speedup / threads.max(1) as f64
}

/// One kernel configuration of the single-rank sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelRecord {
    pub matrix_name: String,
    /// `csr_seq`, `csr`, `csb_seq` or `csb`
    pub kernel: &'static str,
    /// CSR schedule, `None` for kernels without one
    pub schedule: Option<String>,
    pub chunk_size: Option<usize>,
    pub threads: usize,
    /// p90 of the per-run mean call time, in seconds
    pub p90: f64,
    /// Against the sequential CSR baseline
    pub speedup: Option<f64>,
    /// Sum of the last output, so the product cannot be optimised away unseen
    pub checksum: f64,
}

impl KernelRecord {
    pub const CSV_HEADER: &'static str =
        "matrix_name,kernel,schedule,chunk_size,num_threads,p90_time,speedup,efficiency,checksum";

    pub fn efficiency(&self) -> Option<f64> {
        self.speedup.map(|s| efficiency(s, self.threads))
    }

    pub fn to_csv(&self) -> String {
        let opt = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_default();
        format!(
            "{},{},{},{},{},{:.9},{},{},{:.6e}",
            self.matrix_name,
            self.kernel,
            self.schedule.as_deref().unwrap_or("none"),
            self.chunk_size
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.threads,
            self.p90,
            opt(self.speedup),
            opt(self.efficiency()),
            self.checksum
        )
    }
}

/// One timed refresh+multiply on one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub matrix_name: String,
    pub rank: usize,
    pub num_procs: usize,
    pub run: usize,
    /// Seconds for refresh plus multiply
    pub elapsed_time: f64,
    /// Seconds spent in the ghost refresh
    pub comm_time: f64,
    pub local_nz: usize,
    pub ghost_entries: usize,
}

impl RunRecord {
    pub const CSV_HEADER: &'static str =
        "matrix_name,rank,num_procs,run,elapsed_time,comm_time,local_nz,ghost_entries,local_flops";

    /// Floating-point operations of one local multiply (one multiply and one add per nonzero)
    pub fn local_flops(&self) -> usize {
        2 * self.local_nz
    }

    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{:.9},{:.9},{},{},{}",
            self.matrix_name,
            self.rank,
            self.num_procs,
            self.run,
            self.elapsed_time,
            self.comm_time,
            self.local_nz,
            self.ghost_entries,
            self.local_flops()
        )
    }
}

/// What each rank contributes to the group summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankStats {
    pub local_nz: usize,
    pub num_ghosts: usize,
    /// 90th percentile of this rank's total step times, in seconds
    pub p90: f64,
}

/// Group-wide metrics: ghost spread, load imbalance and throughput at the slowest rank.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub matrix_name: String,
    pub num_procs: usize,
    pub ghost_min: usize,
    pub ghost_avg: f64,
    pub ghost_max: usize,
    /// `max_nz / avg_nz`; 1.0 is perfectly balanced
    pub load_imbalance: f64,
    /// Slowest rank's p90 step time, in seconds
    pub max_p90: f64,
    pub gflops: f64,
}

impl GroupSummary {
    pub const CSV_HEADER: &'static str = "matrix_name,num_procs,ghost_entries_min,ghost_entries_avg,\
ghost_entries_max,load_imbalance_ratio,system_p90_time,total_gflops";

    /// Combines per-rank statistics. Returns `None` for an empty group.
    pub fn from_ranks(matrix_name: &str, ranks: &[RankStats]) -> Option<Self> {
        let n = ranks.len();
        if n == 0 {
            return None;
        }

        let ghost_min = ranks.iter().map(|r| r.num_ghosts).min()?;
        let ghost_max = ranks.iter().map(|r| r.num_ghosts).max()?;
        let ghost_sum: usize = ranks.iter().map(|r| r.num_ghosts).sum();

        let nz_max = ranks.iter().map(|r| r.local_nz).max()?;
        let nz_sum: usize = ranks.iter().map(|r| r.local_nz).sum();
        let nz_avg = nz_sum as f64 / n as f64;

        let max_p90 = ranks.iter().map(|r| r.p90).fold(0.0, f64::max);
        let total_flops = 2.0 * nz_sum as f64;

        Some(Self {
            matrix_name: matrix_name.to_string(),
            num_procs: n,
            ghost_min,
            ghost_avg: ghost_sum as f64 / n as f64,
            ghost_max,
            load_imbalance: if nz_avg > 0.0 { nz_max as f64 / nz_avg } else { 0.0 },
            max_p90,
            gflops: if max_p90 > 0.0 { total_flops / max_p90 / 1e9 } else { 0.0 },
        })
    }

    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{:.2},{},{:.4},{:.9},{:.4}",
            self.matrix_name,
            self.num_procs,
            self.ghost_min,
            self.ghost_avg,
            self.ghost_max,
            self.load_imbalance,
            self.max_p90,
            self.gflops
        )
    }
}
