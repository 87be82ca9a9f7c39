//! Volatility regime classification.
//!
//! Rolling annualized volatility is clustered into three groups with a
//! deterministic k-means (centroids seeded at the 16th/50th/84th percentiles),
//! then relabeled Low/Medium/High by ascending centroid. Raw cluster indices
//! never leave this module.
//!
//! Classification always runs on a fund's full history; callers must not pass
//! a window-restricted series.

use chrono::NaiveDate;
use navrisk_core::domain::{DatedSeries, Fault, Metric, ReturnSeries};
use navrisk_core::stats::{mean, percentile_sorted, sample_std, sorted};
use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::drawdown::drawdown_path;
use crate::kmeans;
use crate::metrics::sharpe_ratio;

pub const REGIME_COUNT: usize = 3;

const INIT_PERCENTILES: [f64; REGIME_COUNT] = [16.0, 50.0, 84.0];

/// Volatility levels closer than this (relative to the largest) count as one.
const LEVEL_RESOLUTION: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegimeLabel {
    Low,
    Medium,
    High,
}

impl RegimeLabel {
    pub const ALL: [RegimeLabel; REGIME_COUNT] = [RegimeLabel::Low, RegimeLabel::Medium, RegimeLabel::High];

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_rank(rank: usize) -> Self {
        match rank {
            0 => RegimeLabel::Low,
            1 => RegimeLabel::Medium,
            _ => RegimeLabel::High,
        }
    }
}

/// One classified date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimePoint {
    pub date: NaiveDate,
    pub volatility: f64,
    pub regime: RegimeLabel,
}

/// Row-stochastic regime transition matrix, indexed by [`RegimeLabel::index`].
///
/// A regime with no outgoing transitions gets an identity row; its
/// `row_support` is zero so callers can tell it apart from an observed
/// self-transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    pub probabilities: [[f64; REGIME_COUNT]; REGIME_COUNT],
    pub counts: [[usize; REGIME_COUNT]; REGIME_COUNT],
}

impl TransitionMatrix {
    pub fn from_timeline(labels: &[RegimeLabel]) -> Self {
        let mut counts = [[0usize; REGIME_COUNT]; REGIME_COUNT];
        for pair in labels.windows(2) {
            counts[pair[0].index()][pair[1].index()] += 1;
        }
        let mut probabilities = [[0.0; REGIME_COUNT]; REGIME_COUNT];
        for (i, row) in counts.iter().enumerate() {
            let total: usize = row.iter().sum();
            if total == 0 {
                probabilities[i][i] = 1.0;
            } else {
                for (j, &c) in row.iter().enumerate() {
                    probabilities[i][j] = c as f64 / total as f64;
                }
            }
        }
        Self {
            probabilities,
            counts,
        }
    }

    pub fn probability(&self, from: RegimeLabel, to: RegimeLabel) -> f64 {
        self.probabilities[from.index()][to.index()]
    }

    pub fn row_support(&self, from: RegimeLabel) -> usize {
        self.counts[from.index()].iter().sum()
    }

    /// Persistence of `regime`; `NotComputable` when it is never followed by
    /// another observation.
    pub fn persistence(&self, regime: RegimeLabel) -> Metric {
        if self.row_support(regime) == 0 {
            return Metric::missing(Fault::NotComputable);
        }
        persistence(self.probability(regime, regime))
    }
}

/// Expected stay length `1 / (1 − P(i→i))`; infinite (flagged) when `P(i→i) = 1`.
pub fn persistence(self_transition: f64) -> Metric {
    let leave = 1.0 - self_transition;
    if leave <= 1e-12 {
        Metric::flagged(f64::INFINITY, Fault::Undefined)
    } else {
        Metric::ok(1.0 / leave)
    }
}

/// Per-regime summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub regime: RegimeLabel,
    pub centroid: f64,
    pub observations: usize,
    /// Fraction of classified dates spent in this regime.
    pub share: f64,
    pub mean_volatility: Metric,
    pub min_volatility: Metric,
    pub max_volatility: Metric,
    pub mean_return: Metric,
    /// Worst full-history drawdown observed while in this regime.
    pub worst_drawdown: Metric,
    pub sharpe: Metric,
    pub persistence: Metric,
    /// Consecutive-run statistics.
    pub runs: usize,
    pub average_run: Metric,
    pub max_run: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAnalysis {
    pub window: usize,
    pub centroids: [f64; REGIME_COUNT],
    pub timeline: Vec<RegimePoint>,
    pub transitions: TransitionMatrix,
    pub regimes: Vec<RegimeStats>,
    pub current: RegimeLabel,
    pub iterations: usize,
    pub converged: bool,
}

/// Rolling sample std × √ppy; first value at index `window − 1`.
pub fn rolling_volatility(returns: &[f64], window: usize, periods_per_year: f64) -> Vec<f64> {
    if window < 2 || returns.len() < window {
        return Vec::new();
    }
    let scale = periods_per_year.sqrt();
    returns
        .windows(window)
        .map(|w| sample_std(w).unwrap_or(0.0) * scale)
        .collect()
}

/// Distinct values of a sorted slice, merging values within `resolution`.
fn distinct_levels(sorted: &[f64], resolution: f64) -> Vec<f64> {
    let mut levels: Vec<f64> = Vec::new();
    for &v in sorted {
        match levels.last() {
            Some(&last) if v - last <= resolution => {}
            _ => levels.push(v),
        }
    }
    levels
}

pub struct VolatilityRegimeClassifier {
    config: RegimeConfig,
    periods_per_year: f64,
    risk_free_rate: f64,
}

impl VolatilityRegimeClassifier {
    pub fn new(config: RegimeConfig, periods_per_year: f64) -> Self {
        Self {
            config,
            periods_per_year,
            risk_free_rate: 0.0,
        }
    }

    /// Annual risk-free rate used for the per-regime Sharpe ratios.
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Classify a full-history return series.
    ///
    /// Fewer than three distinguishable volatility levels cannot be split
    /// into ordered regimes and yield `Undefined`.
    pub fn classify(&self, returns: &ReturnSeries) -> Result<RegimeAnalysis, Fault> {
        let window = self.config.window;
        let r = returns.values();
        let vols = rolling_volatility(r, window, self.periods_per_year);
        if vols.len() < REGIME_COUNT {
            return Err(Fault::NotComputable);
        }
        let offset = window - 1;
        let dates = &returns.dates()[offset..];
        let aligned_returns = &r[offset..];

        let sorted_vols = sorted(&vols);
        let resolution = LEVEL_RESOLUTION * sorted_vols.last().copied().unwrap_or(0.0).abs();
        let levels = distinct_levels(&sorted_vols, resolution);
        if levels.len() < REGIME_COUNT {
            return Err(Fault::Undefined);
        }

        let mut init = [0.0; REGIME_COUNT];
        for (slot, p) in init.iter_mut().zip(INIT_PERCENTILES) {
            *slot = percentile_sorted(&sorted_vols, p).ok_or(Fault::NotComputable)?;
        }
        if init.windows(2).any(|w| w[1] - w[0] <= resolution) {
            // Heavily tied percentiles; spread the seeds over the distinct levels.
            init = [levels[0], levels[levels.len() / 2], levels[levels.len() - 1]];
        }

        let fit = kmeans::fit(&vols, init, self.config.max_iterations, self.config.tolerance);
        let rank = kmeans::centroid_ranks(&fit.centroids);
        let mut centroids = [0.0; REGIME_COUNT];
        for (cluster, &c) in fit.centroids.iter().enumerate() {
            centroids[rank[cluster]] = c;
        }
        if centroids.windows(2).any(|w| w[1] - w[0] <= resolution) {
            tracing::debug!(?centroids, "regime centroids collapsed");
            return Err(Fault::Undefined);
        }
        let labels: Vec<RegimeLabel> = fit
            .assignments
            .iter()
            .map(|&c| RegimeLabel::from_rank(rank[c]))
            .collect();

        tracing::debug!(
            iterations = fit.iterations,
            converged = fit.converged,
            ?centroids,
            "regime clustering finished"
        );

        let transitions = TransitionMatrix::from_timeline(&labels);

        // Drawdown of the compounded return path, aligned to the classified dates.
        let mut growth = vec![1.0];
        growth.extend(returns.compounded_path(1.0));
        let dd = drawdown_path(&growth);
        let aligned_dd = &dd[offset + 1..];

        let runs = run_lengths(&labels);
        let total = labels.len() as f64;

        let regimes = RegimeLabel::ALL
            .iter()
            .map(|&regime| {
                let idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == regime).collect();
                let vol: Vec<f64> = idx.iter().map(|&i| vols[i]).collect();
                let ret: Vec<f64> = idx.iter().map(|&i| aligned_returns[i]).collect();
                let worst = idx.iter().map(|&i| aligned_dd[i]).reduce(f64::min);
                let regime_runs: Vec<f64> = runs
                    .iter()
                    .filter(|(l, _)| *l == regime)
                    .map(|(_, n)| *n as f64)
                    .collect();

                let observed = |v: Option<f64>| v.map_or(Metric::missing(Fault::NotComputable), Metric::ok);

                RegimeStats {
                    regime,
                    centroid: centroids[regime.index()],
                    observations: idx.len(),
                    share: idx.len() as f64 / total,
                    mean_volatility: observed(mean(&vol)),
                    min_volatility: observed(vol.iter().copied().reduce(f64::min)),
                    max_volatility: observed(vol.iter().copied().reduce(f64::max)),
                    mean_return: observed(mean(&ret)),
                    worst_drawdown: observed(worst),
                    sharpe: Metric::from(sharpe_ratio(&ret, self.periods_per_year, self.risk_free_rate)),
                    persistence: transitions.persistence(regime),
                    runs: regime_runs.len(),
                    average_run: observed(mean(&regime_runs)),
                    max_run: regime_runs.iter().copied().fold(0.0, f64::max) as usize,
                }
            })
            .collect();

        let timeline = dates
            .iter()
            .zip(&vols)
            .zip(&labels)
            .map(|((date, volatility), regime)| RegimePoint {
                date: *date,
                volatility: *volatility,
                regime: *regime,
            })
            .collect();

        Ok(RegimeAnalysis {
            window,
            centroids,
            timeline,
            transitions,
            regimes,
            current: labels.last().copied().unwrap_or(RegimeLabel::Low),
            iterations: fit.iterations,
            converged: fit.converged,
        })
    }
}

/// Consecutive runs as (label, length).
fn run_lengths(labels: &[RegimeLabel]) -> Vec<(RegimeLabel, usize)> {
    let mut runs: Vec<(RegimeLabel, usize)> = Vec::new();
    for &label in labels {
        match runs.last_mut() {
            Some((last, n)) if *last == label => *n += 1,
            _ => runs.push((label, 1)),
        }
    }
    runs
}
