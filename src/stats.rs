use serde::{Deserialize, Serialize};

/// Mean and standard deviation of a stream of values (Welford's algorithm).
#[derive(Debug, Default)]
pub struct RunningStats {
    n_vals: usize,
    mean: f64,
    sq_dev_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunningStatsReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl RunningStats {
    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        let dev_old = val - self.mean;
        self.mean += dev_old / self.n_vals as f64;
        self.sq_dev_sum += dev_old * (val - self.mean);
    }

    pub fn report(&self) -> RunningStatsReport {
        let std_dev = match self.n_vals {
            0 | 1 => f64::NAN,
            n_vals => (self.sq_dev_sum / (n_vals - 1) as f64).sqrt(),
        };
        RunningStatsReport {
            mean: if self.n_vals == 0 { f64::NAN } else { self.mean },
            std_dev,
        }
    }
}

/// Series of per-frame values, summarized after discarding the initial transient.
#[derive(Debug, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    /// Standard error of the mean.
    pub sem: f64,
    /// Whether the series looks equilibrated before its second half.
    pub is_equil: bool,
    /// Index of the first value used in the summary.
    pub i_equil: usize,
}

impl TimeSeries {
    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = equilibration_index(&self.vals);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: mean(tail),
            std_dev: variance(tail).sqrt(),
            sem: blocking_sem(tail),
            is_equil: i_equil != self.vals.len() / 2,
            i_equil,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn variance(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    let sq_dev_sum: f64 = vals.iter().map(|&val| (val - mean).powi(2)).sum();
    sq_dev_sum / (vals.len() - 1) as f64
}

/// Standard error of the mean of correlated data (Flyvbjerg-Petersen blocking).
///
/// Pairs of values are averaged until the squared error estimate stops growing
/// beyond its own uncertainty.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut levels = Vec::new();
    while blocks.len() >= 2 {
        let n_blocks = blocks.len() as f64;
        let sem_sq = variance(&blocks) / n_blocks;
        let sem_sq_err = sem_sq * (2.0 / (n_blocks - 1.0)).sqrt();
        levels.push((sem_sq, sem_sq_err));

        blocks = blocks
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    for (i_level, &(sem_sq, _)) in levels.iter().enumerate() {
        let plateau_floor = levels[i_level..]
            .iter()
            .map(|&(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if sem_sq > plateau_floor {
            return sem_sq.sqrt();
        }
    }

    levels.last().map_or(f64::NAN, |&(sem_sq, _)| sem_sq.sqrt())
}

/// Start of the equilibrated part of a series (marginal standard error rule).
///
/// Candidate starts are `n / 2^k`; the half-way point is the fallback.
fn equilibration_index(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    let mut best = n_vals / 2;
    if n_vals < 2 {
        return best;
    }

    let mut min_mse = f64::INFINITY;
    let n_candidates = n_vals.ilog2() + 1;
    for k in (1..=n_candidates).rev() {
        let start = n_vals >> k;
        let tail = &vals[start..];
        let n_tail = tail.len();
        let mse = variance(tail) * (n_tail - 1) as f64 / (n_tail * n_tail) as f64;
        if mse < min_mse {
            min_mse = mse;
            best = start;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stats_match_direct_formulas() {
        let vals = [0.2, 0.4, 0.4, 0.9, 0.1];
        let mut stats = RunningStats::default();
        for val in vals {
            stats.add(val);
        }
        let report = stats.report();
        assert!((report.mean - mean(&vals)).abs() < 1e-12);
        assert!((report.std_dev - variance(&vals).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn running_stats_without_values_are_nan() {
        let report = RunningStats::default().report();
        assert!(report.mean.is_nan());
        assert!(report.std_dev.is_nan());
    }

    #[test]
    fn relaxing_series_discards_transient() {
        let mut series = TimeSeries::default();
        for i_val in 0..64 {
            series.push(if i_val < 8 { 1.0 - i_val as f64 / 8.0 } else { 0.0 });
        }
        let report = series.report();
        assert!(report.i_equil >= 8);
        assert_eq!(report.mean, 0.0);
    }

    #[test]
    fn constant_series_has_zero_error() {
        let mut series = TimeSeries::default();
        for _ in 0..32 {
            series.push(0.75);
        }
        let report = series.report();
        assert_eq!(report.mean, 0.75);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
    }
}
