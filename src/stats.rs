use serde::{Deserialize, Serialize};
use std::iter;

/// Online mean and standard deviation (Welford's algorithm).
#[derive(Debug, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Summary of a time series after discarding its equilibration part.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// First index considered equilibrated.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

/// Analyze a time series such as the mean payoff of one angle over rounds.
pub fn analyze_time_series(vals: &[f64]) -> TimeSeriesReport {
    if vals.is_empty() {
        return TimeSeriesReport {
            i_equil: 0,
            mean: f64::NAN,
            std_dev: f64::NAN,
            sem: f64::NAN,
            is_equil: false,
        };
    }

    let i_equil = compute_opt_i_equil(vals);
    let equil_vals = &vals[i_equil..];
    TimeSeriesReport {
        i_equil,
        mean: compute_mean(equil_vals),
        std_dev: compute_var(equil_vals).sqrt(),
        sem: compute_sem(equil_vals),
        is_equil: i_equil != vals.len() / 2,
    }
}

fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn compute_var(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = compute_mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean by Flyvbjerg-Petersen blocking.
///
/// Each level averages neighbouring pairs of the previous one. The estimate is
/// read at the first level that stays above the lower error bound of every
/// coarser level.
fn compute_sem(vals: &[f64]) -> f64 {
    let levels: Vec<(f64, f64)> = iter::successors(Some(vals.to_vec()), |blk| {
        (blk.len() >= 4).then(|| {
            blk.chunks_exact(2)
                .map(|pair| (pair[0] + pair[1]) / 2.0)
                .collect()
        })
    })
    .filter(|blk| blk.len() >= 2)
    .map(|blk| {
        let n_blk = blk.len() as f64;
        let var_mean = compute_var(&blk) / n_blk;
        (var_mean, var_mean * (2.0 / (n_blk - 1.0)).sqrt())
    })
    .collect();

    let plateau = (0..levels.len()).find(|&i_lvl| {
        let var_mean = levels[i_lvl].0;
        levels[i_lvl..]
            .iter()
            .all(|&(est, err)| var_mean > est - err)
    });
    plateau
        .or(levels.len().checked_sub(1))
        .map_or(f64::NAN, |i_lvl| levels[i_lvl].0.sqrt())
}

/// Equilibration index minimizing the marginal standard error (MSER).
///
/// Candidates are `n / 2^k` for `k` from `log2(n) + 1` down to `1`, so at most
/// half of the series is discarded.
fn compute_opt_i_equil(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    if n_vals < 2 {
        return n_vals / 2;
    }

    (1..=n_vals.ilog2() + 1)
        .rev()
        .map(|k| n_vals >> k)
        .map(|i_equil| {
            let tail = &vals[i_equil..];
            let n_tail = tail.len() as f64;
            (i_equil, compute_var(tail) * (n_tail - 1.0) / (n_tail * n_tail))
        })
        .filter(|(_, mser)| !mser.is_nan())
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or(n_vals / 2, |(i_equil, _)| i_equil)
}
