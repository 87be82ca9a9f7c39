//! Pairwise Pearson correlation across a fund universe.
//!
//! Each pair is inner-joined on date before computing. Pairs with fewer than
//! `min_overlap` common dates are `InsufficientOverlap`; a side with zero
//! variance over the overlap is `Undefined`.

use navrisk_core::align::join_slices;
use navrisk_core::domain::{Fault, FundId, Metric};
use navrisk_core::stats::pearson;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One correlation input: a fund's dated values (returns or net flows).
#[derive(Debug, Clone, Copy)]
pub struct CorrelationInput<'a> {
    pub fund: &'a FundId,
    pub dates: &'a [NaiveDate],
    pub values: &'a [f64],
}

/// Symmetric matrix ordered as `funds`. The diagonal is 1 unless the fund
/// itself has fewer than `min_overlap` dates, in which case it carries
/// `InsufficientOverlap` like the rest of its row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub funds: Vec<FundId>,
    pub values: Vec<Vec<Metric>>,
    /// Common-date count per pair.
    pub overlap: Vec<Vec<usize>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &FundId, b: &FundId) -> Option<Metric> {
        let i = self.funds.iter().position(|f| f == a)?;
        let j = self.funds.iter().position(|f| f == b)?;
        Some(self.values[i][j])
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

pub struct CorrelationEngine {
    min_overlap: usize,
}

impl CorrelationEngine {
    pub fn new(min_overlap: usize) -> Self {
        Self { min_overlap }
    }

    pub fn pair(&self, a: &CorrelationInput<'_>, b: &CorrelationInput<'_>) -> (Metric, usize) {
        let joined = join_slices(a.dates, a.values, b.dates, b.values);
        if joined.len() < self.min_overlap {
            return (Metric::missing(Fault::InsufficientOverlap), joined.len());
        }
        let metric = pearson(&joined.left, &joined.right)
            .map_or(Metric::missing(Fault::Undefined), Metric::ok);
        (metric, joined.len())
    }

    pub fn matrix(&self, inputs: &[CorrelationInput<'_>]) -> CorrelationMatrix {
        let n = inputs.len();
        let mut values = vec![vec![Metric::ok(1.0); n]; n];
        let mut overlap = vec![vec![0usize; n]; n];
        let mut insufficient = 0;
        for i in 0..n {
            overlap[i][i] = inputs[i].dates.len();
            if overlap[i][i] < self.min_overlap {
                values[i][i] = Metric::missing(Fault::InsufficientOverlap);
            }
            for j in (i + 1)..n {
                let (m, o) = self.pair(&inputs[i], &inputs[j]);
                if m.fault() == Some(Fault::InsufficientOverlap) {
                    insufficient += 1;
                }
                values[i][j] = m;
                values[j][i] = m;
                overlap[i][j] = o;
                overlap[j][i] = o;
            }
        }
        tracing::debug!(funds = n, insufficient, "correlation matrix built");
        CorrelationMatrix {
            funds: inputs.iter().map(|i| i.fund.clone()).collect(),
            values,
            overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dates(n: usize, offset: i64) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64 + offset)).collect()
    }

    #[test]
    fn two_fund_matrix_is_symmetric_with_unit_diagonal() {
        let a = FundId::from("A");
        let b = FundId::from("B");
        let d = dates(12, 0);
        let va: Vec<f64> = (0..12).map(|i| ((i * 7) % 5) as f64 / 100.0).collect();
        let vb: Vec<f64> = (0..12).map(|i| ((i * 3) % 4) as f64 / 100.0).collect();
        let m = CorrelationEngine::new(10).matrix(&[
            CorrelationInput { fund: &a, dates: &d, values: &va },
            CorrelationInput { fund: &b, dates: &d, values: &vb },
        ]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.values[0][0], Metric::ok(1.0));
        assert_eq!(m.values[1][1], Metric::ok(1.0));
        assert_eq!(m.values[0][1], m.values[1][0]);
        let c = m.values[0][1].value().unwrap();
        assert!((-1.0..=1.0).contains(&c));
        assert_eq!(m.get(&a, &b), Some(m.values[0][1]));
    }

    #[test]
    fn short_overlap_is_flagged() {
        let a = FundId::from("A");
        let b = FundId::from("B");
        let da = dates(12, 0);
        let db = dates(12, 5); // 7 common dates
        let v: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let m = CorrelationEngine::new(10).matrix(&[
            CorrelationInput { fund: &a, dates: &da, values: &v },
            CorrelationInput { fund: &b, dates: &db, values: &v },
        ]);
        assert_eq!(m.values[0][1], Metric::missing(Fault::InsufficientOverlap));
        assert_eq!(m.overlap[0][1], 7);
        assert_eq!(m.values[0][0], Metric::ok(1.0));
    }

    #[test]
    fn short_fund_diagonal_is_flagged() {
        let a = FundId::from("A");
        let b = FundId::from("B");
        let da = dates(12, 0);
        let db = dates(4, 0);
        let v: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let m = CorrelationEngine::new(10).matrix(&[
            CorrelationInput { fund: &a, dates: &da, values: &v },
            CorrelationInput { fund: &b, dates: &db, values: &v[..4] },
        ]);
        assert_eq!(m.values[0][0], Metric::ok(1.0));
        assert_eq!(m.values[1][1], Metric::missing(Fault::InsufficientOverlap));
        assert_eq!(m.values[1][0], Metric::missing(Fault::InsufficientOverlap));
        assert_eq!(m.overlap[1][1], 4);
    }

    #[test]
    fn constant_side_is_undefined() {
        let a = FundId::from("A");
        let b = FundId::from("B");
        let d = dates(10, 0);
        let va: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let vb = vec![0.5; 10];
        let (m, _) = CorrelationEngine::new(10).pair(
            &CorrelationInput { fund: &a, dates: &d, values: &va },
            &CorrelationInput { fund: &b, dates: &d, values: &vb },
        );
        assert_eq!(m, Metric::missing(Fault::Undefined));
    }
}
