//! Upside / downside capture against a benchmark.
//!
//! Dates are split by the sign of the benchmark return; zero-return benchmark
//! dates belong to neither side.

use chrono::NaiveDate;
use navrisk_core::align::inner_join;
use navrisk_core::domain::{DatedSeries, Fault, FundId, Metric, ReturnSeries};
use navrisk_core::stats::ZERO_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the benchmark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkSource {
    Supplied,
    /// Equal-weighted average of the other funds in the universe.
    PeerAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRatios {
    pub source: BenchmarkSource,
    pub common_dates: usize,
    pub up_periods: usize,
    pub down_periods: usize,
    /// Percent.
    pub upside_capture: Metric,
    /// Percent.
    pub downside_capture: Metric,
    /// `|upside| / |downside|`.
    pub capture_ratio: Metric,
}

fn side_capture(fund: &[f64], bench: &[f64]) -> Metric {
    if bench.is_empty() {
        return Metric::missing(Fault::Undefined);
    }
    let b: f64 = bench.iter().sum();
    if b.abs() < ZERO_TOLERANCE {
        return Metric::missing(Fault::Undefined);
    }
    let f: f64 = fund.iter().sum();
    Metric::ok(f / b * 100.0)
}

pub struct CaptureRatioCalculator;

impl CaptureRatioCalculator {
    pub fn compute(fund: &ReturnSeries, benchmark: &ReturnSeries, source: BenchmarkSource) -> CaptureRatios {
        let joined = inner_join(fund, benchmark);

        let (mut up_f, mut up_b, mut down_f, mut down_b) = (vec![], vec![], vec![], vec![]);
        for (&f, &b) in joined.left.iter().zip(&joined.right) {
            if b > 0.0 {
                up_f.push(f);
                up_b.push(b);
            } else if b < 0.0 {
                down_f.push(f);
                down_b.push(b);
            }
        }

        let upside = side_capture(&up_f, &up_b);
        let downside = side_capture(&down_f, &down_b);
        let capture_ratio = match (upside.value(), downside.value()) {
            (Some(u), Some(d)) if d.abs() >= ZERO_TOLERANCE => Metric::ok(u.abs() / d.abs()),
            (Some(_), Some(_)) => Metric::missing(Fault::Undefined),
            _ => Metric::missing(upside.fault().or(downside.fault()).unwrap_or(Fault::Undefined)),
        };

        CaptureRatios {
            source,
            common_dates: joined.len(),
            up_periods: up_b.len(),
            down_periods: down_b.len(),
            upside_capture: upside,
            downside_capture: downside,
            capture_ratio,
        }
    }
}

/// Equal-weighted per-date average of every fund's returns except `exclude`.
///
/// A date is included when at least one peer has a return on it.
pub fn peer_average(all: &BTreeMap<FundId, ReturnSeries>, exclude: &FundId) -> Result<ReturnSeries, Fault> {
    let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut peers = 0;
    for (id, series) in all {
        if id == exclude {
            continue;
        }
        peers += 1;
        for (date, r) in series.iter() {
            let e = acc.entry(date).or_insert((0.0, 0));
            e.0 += r;
            e.1 += 1;
        }
    }
    if peers == 0 || acc.is_empty() {
        return Err(Fault::NotComputable);
    }
    ReturnSeries::from_points(acc.into_iter().map(|(d, (s, n))| (d, s / n as f64)))
        .map_err(|_| Fault::NotComputable)
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
    fn known_capture_values() {
        let bench = series(&[0.02, -0.01, 0.0, 0.01, -0.03]);
        let fund = series(&[0.01, -0.02, 0.05, 0.02, -0.01]);
        let c = CaptureRatioCalculator::compute(&fund, &bench, BenchmarkSource::Supplied);
        assert_eq!(c.up_periods, 2);
        assert_eq!(c.down_periods, 2);
        // up: 0.03 / 0.03 = 100%; down: -0.03 / -0.04 = 75%
        assert!((c.upside_capture.value().unwrap() - 100.0).abs() < 1e-9);
        assert!((c.downside_capture.value().unwrap() - 75.0).abs() < 1e-9);
        assert!((c.capture_ratio.value().unwrap() - 100.0 / 75.0).abs() < 1e-9);
    }

    #[test]
    fn no_down_dates_is_undefined() {
        let bench = series(&[0.01, 0.02, 0.0]);
        let fund = series(&[0.01, 0.01, 0.01]);
        let c = CaptureRatioCalculator::compute(&fund, &bench, BenchmarkSource::Supplied);
        assert!(c.upside_capture.is_ok());
        assert_eq!(c.downside_capture, Metric::missing(Fault::Undefined));
        assert_eq!(c.capture_ratio, Metric::missing(Fault::Undefined));
    }

    #[test]
    fn identical_series_capture_is_full() {
        let s = series(&[0.01, -0.02, 0.03, -0.01]);
        let c = CaptureRatioCalculator::compute(&s, &s, BenchmarkSource::Supplied);
        assert!((c.upside_capture.value().unwrap() - 100.0).abs() < 1e-9);
        assert!((c.downside_capture.value().unwrap() - 100.0).abs() < 1e-9);
        assert!((c.capture_ratio.value().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn peer_average_excludes_self() {
        let mut all = BTreeMap::new();
        all.insert(FundId::from("A"), series(&[0.10, 0.10]));
        all.insert(FundId::from("B"), series(&[0.02, 0.04]));
        all.insert(FundId::from("C"), series(&[0.04, 0.00]));
        let avg = peer_average(&all, &FundId::from("A")).unwrap();
        assert_eq!(avg.len(), 2);
        assert!((avg.values()[0] - 0.03).abs() < 1e-12);
        assert!((avg.values()[1] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn peer_average_without_peers() {
        let mut all = BTreeMap::new();
        all.insert(FundId::from("A"), series(&[0.10]));
        assert_eq!(peer_average(&all, &FundId::from("A")).unwrap_err(), Fault::NotComputable);
    }
}
