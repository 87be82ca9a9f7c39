//! Tail risk: historical VaR / CVaR, skewness, excess kurtosis.
//!
//! VaR and CVaR are reported as non-negative loss magnitudes. Estimates on
//! fewer than `low_confidence_below` samples are returned but flagged.

use navrisk_core::domain::{Fault, Metric};
use navrisk_core::stats::{central_moments, compound, mean, sorted, percentile_sorted, ZERO_TOLERANCE};
use serde::{Deserialize, Serialize};

use crate::config::{HorizonScaling, RiskConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailMetrics {
    pub confidence_level: f64,
    pub var_horizon: usize,
    pub var: Metric,
    pub cvar: Metric,
    pub skewness: Metric,
    pub excess_kurtosis: Metric,
}

pub fn compute_tail_metrics(returns: &[f64], config: &RiskConfig) -> TailMetrics {
    let (var, cvar) = historical_var_cvar(returns, config);
    TailMetrics {
        confidence_level: config.confidence_level,
        var_horizon: config.var_horizon,
        var,
        cvar,
        skewness: Metric::from(skewness(returns)),
        excess_kurtosis: Metric::from(excess_kurtosis(returns)),
    }
}

/// VaR and CVaR under the configured horizon scaling.
pub fn historical_var_cvar(returns: &[f64], config: &RiskConfig) -> (Metric, Metric) {
    let horizon = config.var_horizon.max(1);
    let (sample, scale) = match config.horizon_scaling {
        HorizonScaling::SquareRootOfTime => (returns.to_vec(), (horizon as f64).sqrt()),
        HorizonScaling::Compounded => (overlapping_compounded(returns, horizon), 1.0),
    };
    match var_cvar(&sample, config.confidence_level) {
        Ok((var, cvar)) => (
            Metric::with_confidence(var * scale, sample.len(), config.low_confidence_below),
            Metric::with_confidence(cvar * scale, sample.len(), config.low_confidence_below),
        ),
        Err(fault) => (Metric::missing(fault), Metric::missing(fault)),
    }
}

/// One-period VaR and CVaR magnitudes.
///
/// The threshold is the `(1 − confidence)` empirical quantile; CVaR is the mean
/// of returns at or below it.
pub fn var_cvar(returns: &[f64], confidence_level: f64) -> Result<(f64, f64), Fault> {
    if returns.is_empty() {
        return Err(Fault::NotComputable);
    }
    let s = sorted(returns);
    let threshold =
        percentile_sorted(&s, (1.0 - confidence_level) * 100.0).ok_or(Fault::NotComputable)?;
    let tail: Vec<f64> = s.iter().copied().take_while(|r| *r <= threshold).collect();
    // The smallest value always satisfies r <= threshold.
    let tail_mean = mean(&tail).unwrap_or(threshold);
    Ok(((-threshold).max(0.0), (-tail_mean).max(0.0)))
}

/// Overlapping compounded `horizon`-period returns.
pub fn overlapping_compounded(returns: &[f64], horizon: usize) -> Vec<f64> {
    if horizon == 0 || returns.len() < horizon {
        return Vec::new();
    }
    returns.windows(horizon).map(compound).collect()
}

/// Bias-corrected sample skewness (G1). Needs 3 observations.
pub fn skewness(returns: &[f64]) -> Result<f64, Fault> {
    let n = returns.len();
    if n < 3 {
        return Err(Fault::NotComputable);
    }
    let (m2, m3, _) = central_moments(returns).ok_or(Fault::NotComputable)?;
    if m2 < ZERO_TOLERANCE {
        return Err(Fault::Undefined);
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    Ok(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected sample excess kurtosis (G2). Needs 4 observations.
pub fn excess_kurtosis(returns: &[f64]) -> Result<f64, Fault> {
    let n = returns.len();
    if n < 4 {
        return Err(Fault::NotComputable);
    }
    let (m2, _, m4) = central_moments(returns).ok_or(Fault::NotComputable)?;
    if m2 < ZERO_TOLERANCE {
        return Err(Fault::Undefined);
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    Ok(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

// ─── Tests ───────────────────────────────────────────────────────────
