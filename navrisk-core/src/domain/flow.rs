//! Cash-flow records (subscriptions / redemptions) and per-fund flow series.

use super::ids::FundId;
use super::series::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operation kind of a flow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Subscription,
    Redemption,
}

impl FlowKind {
    /// +1 for money in, -1 for money out.
    pub fn sign(self) -> f64 {
        match self {
            FlowKind::Subscription => 1.0,
            FlowKind::Redemption => -1.0,
        }
    }
}

/// A single subscription or redemption. `amount` is a non-negative magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    pub fund: FundId,
    pub kind: FlowKind,
    pub amount: f64,
    pub segment: String,
}

impl FlowRecord {
    /// Subscriptions positive, redemptions negative.
    pub fn signed_amount(&self) -> f64 {
        self.kind.sign() * self.amount
    }

    /// Amount is finite and non-negative.
    pub fn is_sane(&self) -> bool {
        self.amount.is_finite() && self.amount >= 0.0
    }
}

/// All flow records of one fund, sorted by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSeries {
    records: Vec<FlowRecord>,
}

impl FlowSeries {
    /// Builds the series, dropping records with negative or non-finite amounts.
    pub fn new(mut records: Vec<FlowRecord>) -> Self {
        let before = records.len();
        records.retain(FlowRecord::is_sane);
        if records.len() < before {
            tracing::warn!(dropped = before - records.len(), "dropped invalid flow records");
        }
        records.sort_by(|a, b| a.date.cmp(&b.date));
        Self { records }
    }

    /// Records dated inside the window.
    pub fn restrict(&self, window: &DateWindow) -> Self {
        if window.is_unbounded() {
            return self.clone();
        }
        Self {
            records: self.records.iter().filter(|r| window.contains(r.date)).cloned().collect(),
        }
    }

    pub fn records(&self) -> &[FlowRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total(&self, kind: FlowKind) -> f64 {
        self.records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.amount)
            .sum()
    }

    pub fn net(&self) -> f64 {
        self.records.iter().map(FlowRecord::signed_amount).sum()
    }

    /// Signed net flow aggregated per date.
    pub fn net_by_date(&self) -> BTreeMap<NaiveDate, f64> {
        let mut out = BTreeMap::new();
        for r in &self.records {
            *out.entry(r.date).or_insert(0.0) += r.signed_amount();
        }
        out
    }

    /// Signed net flow aggregated per client segment.
    pub fn by_segment(&self) -> BTreeMap<String, SegmentFlows> {
        let mut out: BTreeMap<String, SegmentFlows> = BTreeMap::new();
        for r in &self.records {
            let entry = out.entry(r.segment.clone()).or_default();
            match r.kind {
                FlowKind::Subscription => entry.subscriptions += r.amount,
                FlowKind::Redemption => entry.redemptions += r.amount,
            }
            entry.count += 1;
        }
        out
    }
}

/// Flow totals for one client segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentFlows {
    pub subscriptions: f64,
    pub redemptions: f64,
    pub count: usize,
}

impl SegmentFlows {
    pub fn net(&self) -> f64 {
        self.subscriptions - self.redemptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(day: u32, kind: FlowKind, amount: f64, segment: &str) -> FlowRecord {
        FlowRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            fund: FundId::from("F"),
            kind,
            amount,
            segment: segment.to_string(),
        }
    }

    #[test]
    fn signed_amounts_and_totals() {
        let s = FlowSeries::new(vec![
            rec(2, FlowKind::Subscription, 100.0, "Retail"),
            rec(1, FlowKind::Redemption, 40.0, "Institutional"),
            rec(2, FlowKind::Redemption, 10.0, "Retail"),
        ]);
        assert_eq!(s.records()[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(s.total(FlowKind::Subscription), 100.0);
        assert_eq!(s.total(FlowKind::Redemption), 50.0);
        assert_eq!(s.net(), 50.0);

        let by_date = s.net_by_date();
        assert_eq!(by_date.len(), 2);
        assert_eq!(by_date.values().copied().collect::<Vec<_>>(), vec![-40.0, 90.0]);
    }

    #[test]
    fn segment_breakdown() {
        let s = FlowSeries::new(vec![
            rec(1, FlowKind::Subscription, 100.0, "Retail"),
            rec(2, FlowKind::Redemption, 30.0, "Retail"),
            rec(3, FlowKind::Subscription, 5.0, "Corporate"),
        ]);
        let seg = s.by_segment();
        assert_eq!(seg["Retail"].net(), 70.0);
        assert_eq!(seg["Retail"].count, 2);
        assert_eq!(seg["Corporate"].subscriptions, 5.0);
    }

    #[test]
    fn restrict_keeps_records_in_window() {
        let s = FlowSeries::new(vec![
            rec(1, FlowKind::Subscription, 100.0, "Retail"),
            rec(5, FlowKind::Redemption, 30.0, "Retail"),
            rec(9, FlowKind::Subscription, 7.0, "Retail"),
        ]);
        let window = DateWindow::new(NaiveDate::from_ymd_opt(2024, 3, 5), NaiveDate::from_ymd_opt(2024, 3, 8));
        let r = s.restrict(&window);
        assert_eq!(r.records().len(), 1);
        assert_eq!(r.net(), -30.0);
        assert_eq!(s.restrict(&DateWindow::default()), s);
    }

    #[test]
    fn invalid_amounts_are_dropped() {
        let s = FlowSeries::new(vec![
            rec(1, FlowKind::Subscription, -5.0, "Retail"),
            rec(2, FlowKind::Subscription, f64::NAN, "Retail"),
            rec(3, FlowKind::Subscription, 5.0, "Retail"),
        ]);
        assert_eq!(s.records().len(), 1);
    }
}
