//! Dated series: raw input observations, clean valuations, and derived returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors raised when building a series that violates its invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("length mismatch: {dates} dates vs {values} values")]
    LengthMismatch { dates: usize, values: usize },
    #[error("dates not strictly increasing at index {index} ({date})")]
    UnsortedDates { index: usize, date: NaiveDate },
    #[error("non-positive valuation {value} at index {index}")]
    NonPositiveValue { index: usize, value: f64 },
    #[error("non-finite value at index {index}")]
    NonFiniteValue { index: usize },
}

/// A single raw input point. `value` is `None` when the source cell was empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl RawObservation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }
}

/// Optional inclusive date window used to restrict an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Common read access to a dated series.
pub trait DatedSeries {
    fn dates(&self) -> &[NaiveDate];
    fn values(&self) -> &[f64];

    fn len(&self) -> usize {
        self.dates().len()
    }

    fn is_empty(&self) -> bool {
        self.dates().is_empty()
    }

    fn first_date(&self) -> Option<NaiveDate> {
        self.dates().first().copied()
    }

    fn last_date(&self) -> Option<NaiveDate> {
        self.dates().last().copied()
    }

    /// Value on exactly `date`, if present.
    fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates()
            .binary_search(&date)
            .ok()
            .map(|i| self.values()[i])
    }

    /// Index of the first observation on or after `date`.
    fn index_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let i = self.dates().partition_point(|d| *d < date);
        (i < self.len()).then_some(i)
    }
}

fn check_dates(dates: &[NaiveDate]) -> Result<(), SeriesError> {
    for (i, pair) in dates.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(SeriesError::UnsortedDates {
                index: i + 1,
                date: pair[1],
            });
        }
    }
    Ok(())
}

fn check_lengths(dates: &[NaiveDate], values: &[f64]) -> Result<(), SeriesError> {
    if dates.len() != values.len() {
        return Err(SeriesError::LengthMismatch {
            dates: dates.len(),
            values: values.len(),
        });
    }
    Ok(())
}

/// Clean valuation series: strictly increasing dates, strictly positive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ValuationSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, SeriesError> {
        check_lengths(&dates, &values)?;
        check_dates(&dates)?;
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(SeriesError::NonFiniteValue { index });
            }
            if value <= 0.0 {
                return Err(SeriesError::NonPositiveValue { index, value });
            }
        }
        Ok(Self { dates, values })
    }

    pub fn from_points(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Result<Self, SeriesError> {
        let (dates, values) = points.into_iter().unzip();
        Self::new(dates, values)
    }

    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Simple returns: `value[i] / value[i-1] - 1`, one entry shorter.
    pub fn returns(&self) -> ReturnSeries {
        let values = self.values.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        ReturnSeries {
            dates: self.dates.iter().skip(1).copied().collect(),
            values,
        }
    }

    /// Log returns: `ln(value[i] / value[i-1])`.
    pub fn log_returns(&self) -> ReturnSeries {
        let values = self.values.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        ReturnSeries {
            dates: self.dates.iter().skip(1).copied().collect(),
            values,
        }
    }

    /// Subset inside `window`. Invariants carry over from `self`.
    pub fn restrict(&self, window: &DateWindow) -> Self {
        let (dates, values) = self
            .dates
            .iter()
            .zip(&self.values)
            .filter(|(d, _)| window.contains(**d))
            .map(|(d, v)| (*d, *v))
            .unzip();
        Self { dates, values }
    }

    pub fn first_value(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

impl DatedSeries for ValuationSeries {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Dated periodic returns. Each date is the end of the period the return covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, SeriesError> {
        check_lengths(&dates, &values)?;
        check_dates(&dates)?;
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFiniteValue { index });
        }
        Ok(Self { dates, values })
    }

    pub fn from_points(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Result<Self, SeriesError> {
        let (dates, values) = points.into_iter().unzip();
        Self::new(dates, values)
    }

    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn restrict(&self, window: &DateWindow) -> Self {
        let (dates, values) = self
            .dates
            .iter()
            .zip(&self.values)
            .filter(|(d, _)| window.contains(**d))
            .map(|(d, v)| (*d, *v))
            .unzip();
        Self { dates, values }
    }

    /// Compounded growth path starting at `base`: `base * Π(1 + r)`, same length as self.
    pub fn compounded_path(&self, base: f64) -> Vec<f64> {
        self.values
            .iter()
            .scan(base, |level, r| {
                *level *= 1.0 + r;
                Some(*level)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

impl DatedSeries for ReturnSeries {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn values(&self) -> &[f64] {
        &self.values
    }
}
