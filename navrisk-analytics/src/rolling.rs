//! Rolling risk indicators over a trailing window.
//!
//! One point per return date once the window is full. Sharpe is `None` on
//! windows with zero volatility; Sharpe stability is the sample standard
//! deviation of the defined rolling Sharpe values.

use chrono::NaiveDate;
use navrisk_core::domain::{DatedSeries, Fault, Metric, ReturnSeries};
use navrisk_core::stats::{mean, sample_std, ZERO_TOLERANCE};
use serde::{Deserialize, Serialize};

use crate::tail_metrics::var_cvar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub mean_return: f64,
    /// Annualized.
    pub volatility: f64,
    pub sharpe: Option<f64>,
    /// One-period loss magnitudes at the configured confidence.
    pub var: f64,
    pub cvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingRiskIndicators {
    pub window: usize,
    pub points: Vec<RollingPoint>,
    pub sharpe_stability: Metric,
}

pub fn compute_rolling(
    returns: &ReturnSeries,
    window: usize,
    periods_per_year: f64,
    confidence_level: f64,
) -> RollingRiskIndicators {
    let r = returns.values();
    let mut points = Vec::new();
    if window >= 2 && r.len() >= window {
        for (end, slice) in (window - 1..).zip(r.windows(window)) {
            let m = mean(slice).unwrap_or(0.0);
            let std = sample_std(slice).unwrap_or(0.0);
            let vol = std * periods_per_year.sqrt();
            let sharpe = (vol >= ZERO_TOLERANCE).then(|| m * periods_per_year / vol);
            let (var, cvar) = var_cvar(slice, confidence_level).unwrap_or((0.0, 0.0));
            points.push(RollingPoint {
                date: returns.dates()[end],
                mean_return: m,
                volatility: vol,
                sharpe,
                var,
                cvar,
            });
        }
    }

    let sharpes: Vec<f64> = points.iter().filter_map(|p| p.sharpe).collect();
    let sharpe_stability = sample_std(&sharpes).map_or(Metric::missing(Fault::NotComputable), Metric::ok);

    RollingRiskIndicators {
        window,
        points,
        sharpe_stability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64]) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReturnSeries::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
        .unwrap()
    }

    #[test]
    fn one_point_per_full_window() {
        let r: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.01 } else { -0.005 }).collect();
        let out = compute_rolling(&series(&r), 4, 252.0, 0.95);
        assert_eq!(out.points.len(), 7);
        assert_eq!(out.points[0].date, series(&r).dates()[3]);
        assert!(out.points.iter().all(|p| p.volatility >= 0.0 && p.var >= 0.0 && p.cvar >= 0.0));
    }

    #[test]
    fn too_short_gives_no_points() {
        let out = compute_rolling(&series(&[0.01, 0.02]), 60, 252.0, 0.95);
        assert!(out.points.is_empty());
        assert_eq!(out.sharpe_stability, Metric::missing(Fault::NotComputable));
    }

    #[test]
    fn constant_windows_have_no_sharpe() {
        let out = compute_rolling(&series(&[0.01; 8]), 4, 252.0, 0.95);
        assert!(out.points.iter().all(|p| p.sharpe.is_none()));
        assert_eq!(out.sharpe_stability, Metric::missing(Fault::NotComputable));
    }

    #[test]
    fn stable_sharpe_has_zero_stability() {
        // Periodic pattern: every window has the same mean and std.
        let r: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.02 } else { -0.01 }).collect();
        let out = compute_rolling(&series(&r), 4, 252.0, 0.95);
        assert!(out.sharpe_stability.value().unwrap() < 1e-9);
    }
}
