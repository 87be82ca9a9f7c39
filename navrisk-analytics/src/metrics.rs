//! Dispersion and risk-adjusted return metrics.
//!
//! Every metric is a pure function of a return slice and the risk settings.
//! Zero denominators produce `Fault::Undefined`; too few observations produce
//! `Fault::NotComputable`. Nothing here returns a silent zero.

use navrisk_core::domain::{DatedSeries, Fault, Metric, ReturnSeries};
use navrisk_core::stats::{mean, sample_std, ZERO_TOLERANCE};
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::tail_metrics::{compute_tail_metrics, TailMetrics};

/// Scalar risk metrics for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub observations: usize,
    pub annualized_return: Metric,
    pub volatility: Metric,
    pub sharpe: Metric,
    pub sortino: Metric,
    pub calmar: Metric,
    #[serde(flatten)]
    pub tail: TailMetrics,
}

impl RiskMetrics {
    /// `max_drawdown` comes from the drawdown analysis of the same window.
    pub fn compute(returns: &ReturnSeries, max_drawdown: Metric, config: &RiskConfig) -> Self {
        let r = returns.values();
        let ppy = config.periods_per_year;
        let annualized_return = Metric::from(annualized_return(r, ppy));
        Self {
            observations: r.len(),
            volatility: Metric::from(annualized_volatility(r, ppy)),
            sharpe: Metric::from(sharpe_ratio(r, ppy, config.risk_free_rate)),
            sortino: Metric::from(sortino_ratio(r, ppy, config.risk_free_rate)),
            calmar: calmar_ratio(annualized_return, max_drawdown),
            annualized_return,
            tail: compute_tail_metrics(r, config),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Sample standard deviation × √periods_per_year. Zero for a constant series.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> Result<f64, Fault> {
    let std = sample_std(returns).ok_or(Fault::NotComputable)?;
    Ok(std * periods_per_year.sqrt())
}

/// Geometric annualized return: `(Π(1 + r))^(ppy / n) − 1`.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> Result<f64, Fault> {
    if returns.is_empty() {
        return Err(Fault::NotComputable);
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    if growth <= 0.0 {
        return Err(Fault::Undefined);
    }
    Ok(growth.powf(periods_per_year / returns.len() as f64) - 1.0)
}

/// `(mean × ppy − rf) / (std × √ppy)`.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64, risk_free_rate: f64) -> Result<f64, Fault> {
    let m = mean(returns).ok_or(Fault::NotComputable)?;
    let vol = annualized_volatility(returns, periods_per_year)?;
    if vol < ZERO_TOLERANCE {
        return Err(Fault::Undefined);
    }
    Ok((m * periods_per_year - risk_free_rate) / vol)
}

/// Sharpe variant whose denominator is the annualized downside deviation
/// `sqrt(Σ min(r, 0)² / n) × √ppy`.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64, risk_free_rate: f64) -> Result<f64, Fault> {
    if returns.len() < 2 {
        return Err(Fault::NotComputable);
    }
    let m = mean(returns).ok_or(Fault::NotComputable)?;
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside = (downside_sq / returns.len() as f64).sqrt() * periods_per_year.sqrt();
    if downside < ZERO_TOLERANCE {
        return Err(Fault::Undefined);
    }
    Ok((m * periods_per_year - risk_free_rate) / downside)
}

/// `annualized return / |MDD|`. Faults on either input propagate.
pub fn calmar_ratio(annualized_return: Metric, max_drawdown: Metric) -> Metric {
    let (Some(ret), Some(mdd)) = (annualized_return.value(), max_drawdown.value()) else {
        let fault = annualized_return
            .fault()
            .or(max_drawdown.fault())
            .unwrap_or(Fault::NotComputable);
        return Metric::missing(fault);
    };
    if mdd.abs() < ZERO_TOLERANCE {
        return Metric::missing(Fault::Undefined);
    }
    Metric::ok(ret / mdd.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

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
    fn volatility_known_values() {
        let r = [0.01, -0.01, 0.01, -0.01];
        let vol = annualized_volatility(&r, 252.0).unwrap();
        let expected = sample_std(&r).unwrap() * 252.0_f64.sqrt();
        assert!((vol - expected).abs() < 1e-12);
    }

    #[test]
    fn volatility_needs_two_points() {
        assert_eq!(annualized_volatility(&[0.01], 252.0), Err(Fault::NotComputable));
    }

    #[test]
    fn constant_returns_make_sharpe_undefined() {
        assert_eq!(sharpe_ratio(&[0.0, 0.0, 0.0], 252.0, 0.0), Err(Fault::Undefined));
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 252.0, 0.0), Err(Fault::Undefined));
    }

    #[test]
    fn sharpe_known_value() {
        let r = [0.02, -0.01, 0.03, 0.0];
        let m = 0.01;
        let s = sample_std(&r).unwrap();
        let expected = m * 252.0 / (s * 252.0_f64.sqrt());
        assert!((sharpe_ratio(&r, 252.0, 0.0).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let r = [0.02, -0.01, 0.03, 0.0];
        assert!(sharpe_ratio(&r, 252.0, 0.05).unwrap() < sharpe_ratio(&r, 252.0, 0.0).unwrap());
    }

    #[test]
    fn sortino_without_losses_is_undefined() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 252.0, 0.0), Err(Fault::Undefined));
    }

    #[test]
    fn sortino_with_losses() {
        let r = [0.02, -0.01, 0.03, -0.02];
        let downside = ((0.0001 + 0.0004) / 4.0_f64).sqrt() * 252.0_f64.sqrt();
        let expected = 0.005 * 252.0 / downside;
        assert!((sortino_ratio(&r, 252.0, 0.0).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn annualized_return_one_year() {
        let r = vec![0.001; 252];
        let ann = annualized_return(&r, 252.0).unwrap();
        assert!((ann - (1.001_f64.powi(252) - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn calmar_faults() {
        assert_eq!(
            calmar_ratio(Metric::ok(0.1), Metric::ok(0.0)),
            Metric::missing(Fault::Undefined)
        );
        assert_eq!(
            calmar_ratio(Metric::ok(0.1), Metric::missing(Fault::NotComputable)),
            Metric::missing(Fault::NotComputable)
        );
        let c = calmar_ratio(Metric::ok(0.1), Metric::ok(-0.2)).value().unwrap();
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn flat_series_scenario() {
        let m = RiskMetrics::compute(&series(&[0.0, 0.0, 0.0]), Metric::ok(0.0), &RiskConfig::default());
        assert_eq!(m.volatility, Metric::ok(0.0));
        assert_eq!(m.sharpe, Metric::missing(Fault::Undefined));
        assert_eq!(m.sortino, Metric::missing(Fault::Undefined));
        assert_eq!(m.calmar, Metric::missing(Fault::Undefined));
        assert_eq!(m.tail.skewness, Metric::missing(Fault::Undefined));
    }
}
