//! Series preparation: raw observations in, clean valuations and returns out.
//!
//! Bad points (missing, non-positive, non-finite, out of order) are dropped
//! rather than interpolated. A return is formed only between two consecutive
//! raw positions that are both valid, so a single bad point removes at most
//! two returns.

use crate::domain::{
    DatedSeries, DateWindow, Fault, FundId, RawObservation, ReturnSeries, ValuationSeries,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default minimum number of clean valuations.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 2;

/// Why an input point was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    NonPositive,
    NonFinite,
    OutOfOrder,
}

/// A dropped input point. Always carries [`Fault::DataQuality`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub index: usize,
    pub date: NaiveDate,
    pub kind: IssueKind,
}

impl DataIssue {
    pub fn fault(&self) -> Fault {
        Fault::DataQuality
    }
}

/// Output of [`SeriesPreparer::prepare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedSeries {
    pub valuations: ValuationSeries,
    pub returns: ReturnSeries,
    pub issues: Vec<DataIssue>,
    /// `Some(NotComputable)` when fewer than the minimum observations survived.
    pub fault: Option<Fault>,
}

impl PreparedSeries {
    /// Short-circuit helper for downstream analyzers.
    pub fn require(&self) -> Result<&Self, Fault> {
        match self.fault {
            Some(f) => Err(f),
            None => Ok(self),
        }
    }

    pub fn is_computable(&self) -> bool {
        self.fault.is_none()
    }

    /// Restrict to an analysis window. Returns whose base valuation lies
    /// before the window are excluded.
    pub fn restrict(&self, window: &DateWindow, min_observations: usize) -> Self {
        if window.is_unbounded() {
            return self.clone();
        }
        let valuations = self.valuations.restrict(window);
        let returns = match valuations.first_date() {
            Some(first) => {
                let bounded = DateWindow::new(first.succ_opt(), valuations.last_date());
                self.returns.restrict(&bounded)
            }
            None => ReturnSeries::empty(),
        };
        let fault = (self.fault.is_some() || valuations.len() < min_observations)
            .then_some(Fault::NotComputable);
        Self {
            valuations,
            returns,
            issues: self.issues.clone(),
            fault,
        }
    }
}

/// Cleans raw valuation input.
#[derive(Debug, Clone, Copy)]
pub struct SeriesPreparer {
    min_observations: usize,
}

impl Default for SeriesPreparer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_OBSERVATIONS)
    }
}

impl SeriesPreparer {
    pub fn new(min_observations: usize) -> Self {
        Self {
            min_observations: min_observations.max(1),
        }
    }

    pub fn min_observations(&self) -> usize {
        self.min_observations
    }

    /// Clean a raw ordered series.
    pub fn prepare(&self, fund: &FundId, raw: &[RawObservation]) -> PreparedSeries {
        let mut dates = Vec::with_capacity(raw.len());
        let mut values = Vec::with_capacity(raw.len());
        let mut ret_dates = Vec::with_capacity(raw.len());
        let mut ret_values = Vec::with_capacity(raw.len());
        let mut issues = Vec::new();

        let mut last_date: Option<NaiveDate> = None;
        // Value of the immediately preceding raw position, if it was kept.
        let mut prev_kept: Option<f64> = None;

        for (index, obs) in raw.iter().enumerate() {
            let kind = match obs.value {
                None => Some(IssueKind::Missing),
                Some(v) if !v.is_finite() => Some(IssueKind::NonFinite),
                Some(v) if v <= 0.0 => Some(IssueKind::NonPositive),
                Some(_) if last_date.is_some_and(|d| obs.date <= d) => Some(IssueKind::OutOfOrder),
                Some(_) => None,
            };

            match (kind, obs.value) {
                (None, Some(v)) => {
                    if let Some(p) = prev_kept {
                        ret_dates.push(obs.date);
                        ret_values.push(v / p - 1.0);
                    }
                    dates.push(obs.date);
                    values.push(v);
                    last_date = Some(obs.date);
                    prev_kept = Some(v);
                }
                (kind, _) => {
                    issues.push(DataIssue {
                        index,
                        date: obs.date,
                        kind: kind.unwrap_or(IssueKind::Missing),
                    });
                    prev_kept = None;
                }
            }
        }

        if !issues.is_empty() {
            tracing::warn!(fund = %fund, dropped = issues.len(), "dropped invalid valuation points");
        }

        let fault = (dates.len() < self.min_observations).then_some(Fault::NotComputable);
        if fault.is_some() {
            tracing::warn!(
                fund = %fund,
                observations = dates.len(),
                required = self.min_observations,
                "series not computable"
            );
        }

        // Kept dates are strictly increasing and values positive by construction.
        let valuations = ValuationSeries::new(dates, values).unwrap_or_else(|_| ValuationSeries::empty());
        let returns = ReturnSeries::new(ret_dates, ret_values).unwrap_or_else(|_| ReturnSeries::empty());

        PreparedSeries {
            valuations,
            returns,
            issues,
            fault,
        }
    }

    /// Re-run preparation on an already clean series.
    pub fn prepare_clean(&self, fund: &FundId, series: &ValuationSeries) -> PreparedSeries {
        let raw: Vec<RawObservation> = series
            .iter()
            .map(|(date, value)| RawObservation::new(date, value))
            .collect();
        self.prepare(fund, &raw)
    }
}
