//! Date alignment between two dated series.
//!
//! Both inputs are sorted by construction, so the join is a single merge walk.
//! Dates present on only one side are dropped (no forward-fill).

use crate::domain::DatedSeries;
use chrono::NaiveDate;

/// Two series restricted to their common dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedPair {
    pub dates: Vec<NaiveDate>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Inner join on date.
pub fn inner_join<A, B>(left: &A, right: &B) -> AlignedPair
where
    A: DatedSeries + ?Sized,
    B: DatedSeries + ?Sized,
{
    join_slices(left.dates(), left.values(), right.dates(), right.values())
}

/// Inner join of raw (sorted) date/value slices.
pub fn join_slices(
    left_dates: &[NaiveDate],
    left_values: &[f64],
    right_dates: &[NaiveDate],
    right_values: &[f64],
) -> AlignedPair {
    let mut out = AlignedPair::default();
    let (mut i, mut j) = (0, 0);
    while i < left_dates.len() && j < right_dates.len() {
        match left_dates[i].cmp(&right_dates[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.dates.push(left_dates[i]);
                out.left.push(left_values[i]);
                out.right.push(right_values[j]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
