//! Subscription / redemption analysis and its link with net assets.
//!
//! Per fund: totals, segments, weekly stability, monthly seasonality and the
//! net-asset decomposition. Across funds: Pareto concentration of net flows.

use chrono::{Datelike, Duration, NaiveDate};
use navrisk_core::align::inner_join;
use navrisk_core::domain::{DatedSeries, FlowKind, FlowSeries, Fault, FundId, Metric, SegmentFlows, ValuationSeries};
use navrisk_core::stats::{mean, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::correlation::{CorrelationEngine, CorrelationInput};
use crate::performance::cagr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedFlow {
    pub date: NaiveDate,
    /// Subscriptions minus redemptions.
    pub net: f64,
}

/// Net-asset change split into what the valuation did and what flows did.
///
/// The split runs over the first and last dates where both net assets and
/// the valuation exist. The performance contribution holds the starting
/// share count constant: `assets_0 × (nav_1 / nav_0 − 1)`. The flow
/// contribution is the remainder of the net-asset change over those dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetAssetAnalysis {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub start_assets: f64,
    pub end_assets: f64,
    pub growth: Metric,
    pub cagr: Metric,
    /// Correlation of net-asset levels with same-date net flows.
    pub flow_correlation: Metric,
    pub common_dates: usize,
    /// Dates bounding the decomposition; `None` without two common dates.
    pub decomposition_start: Option<NaiveDate>,
    pub decomposition_end: Option<NaiveDate>,
    pub performance_contribution: Metric,
    pub flow_contribution: Metric,
}

/// Dispersion of weekly net flows. Weeks end on Sunday; weeks without any
/// record between the first and last flow count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowStability {
    pub weeks: usize,
    pub mean_weekly_net: Metric,
    pub std_weekly_net: Metric,
    /// `std / |mean|`; `Undefined` when the mean is zero.
    pub coefficient_of_variation: Metric,
}

/// Mean signed record amount for one calendar month across all years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowSeasonBucket {
    pub month: u32,
    pub mean_net: f64,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    pub record_count: usize,
    pub subscriptions: f64,
    pub redemptions: f64,
    pub net_flow: f64,
    pub segments: BTreeMap<String, SegmentFlows>,
    pub net_by_date: Vec<DatedFlow>,
    pub stability: FlowStability,
    pub monthly_seasonality: Vec<FlowSeasonBucket>,
    pub net_assets: Option<NetAssetAnalysis>,
}

/// One fund's place in the universe flow ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFlowShare {
    pub fund: FundId,
    pub net_flow: f64,
    /// Fraction of the universe net flow.
    pub share: f64,
    pub cumulative_share: f64,
}

/// Pareto view of net flows across funds, largest contributor first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConcentration {
    pub shares: Vec<FundFlowShare>,
    pub top3_share: f64,
    /// Funds whose cumulative share stays within 80%.
    pub funds_for_80_percent: usize,
    pub fund_fraction_for_80_percent: f64,
}

fn week_end(date: NaiveDate) -> NaiveDate {
    date + Duration::days(6 - i64::from(date.weekday().num_days_from_monday()))
}

/// Signed net flow per week, keyed by the Sunday ending the week.
pub fn weekly_net(flows: &FlowSeries) -> Vec<(NaiveDate, f64)> {
    let mut by_week: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in flows.records() {
        *by_week.entry(week_end(r.date)).or_insert(0.0) += r.signed_amount();
    }
    let (Some(&first), Some(&last)) = (by_week.keys().next(), by_week.keys().next_back()) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut week = first;
    while week <= last {
        out.push((week, by_week.get(&week).copied().unwrap_or(0.0)));
        week += Duration::days(7);
    }
    out
}

pub fn flow_stability(flows: &FlowSeries) -> FlowStability {
    let weekly: Vec<f64> = weekly_net(flows).into_iter().map(|(_, v)| v).collect();
    let (Some(m), Some(sd)) = (mean(&weekly), sample_std(&weekly)) else {
        let missing = Metric::missing(Fault::NotComputable);
        return FlowStability {
            weeks: weekly.len(),
            mean_weekly_net: missing,
            std_weekly_net: missing,
            coefficient_of_variation: missing,
        };
    };
    let cv = if m.abs() < f64::EPSILON {
        Metric::missing(Fault::Undefined)
    } else {
        Metric::ok(sd / m.abs())
    };
    FlowStability {
        weeks: weekly.len(),
        mean_weekly_net: Metric::ok(m),
        std_weekly_net: Metric::ok(sd),
        coefficient_of_variation: cv,
    }
}

pub fn monthly_flow_seasonality(flows: &FlowSeries) -> Vec<FlowSeasonBucket> {
    let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for r in flows.records() {
        let e = acc.entry(r.date.month()).or_insert((0.0, 0));
        e.0 += r.signed_amount();
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(month, (sum, n))| FlowSeasonBucket {
            month,
            mean_net: sum / n as f64,
            records: n,
        })
        .collect()
}

/// Rank funds by net flow and measure how concentrated the total is.
///
/// `NotComputable` without funds; `Undefined` when net flows cancel out.
pub fn flow_concentration(net_by_fund: &[(FundId, f64)]) -> Result<FlowConcentration, Fault> {
    if net_by_fund.is_empty() {
        return Err(Fault::NotComputable);
    }
    let total: f64 = net_by_fund.iter().map(|(_, v)| v).sum();
    if total.abs() < f64::EPSILON {
        return Err(Fault::Undefined);
    }
    let mut ranked: Vec<&(FundId, f64)> = net_by_fund.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut cumulative = 0.0;
    let shares: Vec<FundFlowShare> = ranked
        .into_iter()
        .map(|(fund, net)| {
            let share = net / total;
            cumulative += share;
            FundFlowShare {
                fund: fund.clone(),
                net_flow: *net,
                share,
                cumulative_share: cumulative,
            }
        })
        .collect();

    let top3_share = shares.iter().take(3).map(|s| s.share).sum();
    let funds_for_80_percent = shares.iter().filter(|s| s.cumulative_share <= 0.8 + 1e-12).count();
    Ok(FlowConcentration {
        top3_share,
        funds_for_80_percent,
        fund_fraction_for_80_percent: funds_for_80_percent as f64 / shares.len() as f64,
        shares,
    })
}

pub struct FlowAnalyzer {
    correlation: CorrelationEngine,
}

impl FlowAnalyzer {
    pub fn new(min_overlap: usize) -> Self {
        Self {
            correlation: CorrelationEngine::new(min_overlap),
        }
    }

    pub fn analyze(
        &self,
        fund: &FundId,
        flows: &FlowSeries,
        net_assets: Option<&ValuationSeries>,
        valuations: &ValuationSeries,
    ) -> FlowAnalysis {
        let net_by_date: Vec<DatedFlow> = flows
            .net_by_date()
            .into_iter()
            .map(|(date, net)| DatedFlow { date, net })
            .collect();

        let net_assets = net_assets
            .filter(|na| !na.is_empty())
            .map(|na| self.net_asset_analysis(fund, na, &net_by_date, valuations));

        FlowAnalysis {
            record_count: flows.records().len(),
            subscriptions: flows.total(FlowKind::Subscription),
            redemptions: flows.total(FlowKind::Redemption),
            net_flow: flows.net(),
            segments: flows.by_segment(),
            net_by_date,
            stability: flow_stability(flows),
            monthly_seasonality: monthly_flow_seasonality(flows),
            net_assets,
        }
    }

    fn net_asset_analysis(
        &self,
        fund: &FundId,
        net_assets: &ValuationSeries,
        net_by_date: &[DatedFlow],
        valuations: &ValuationSeries,
    ) -> NetAssetAnalysis {
        let dates = net_assets.dates();
        let values = net_assets.values();
        let (start, end) = (dates[0], dates[dates.len() - 1]);
        let (start_assets, end_assets) = (values[0], values[values.len() - 1]);

        let flow_dates: Vec<NaiveDate> = net_by_date.iter().map(|f| f.date).collect();
        let flow_values: Vec<f64> = net_by_date.iter().map(|f| f.net).collect();
        let (flow_correlation, common_dates) = self.correlation.pair(
            &CorrelationInput { fund, dates, values },
            &CorrelationInput {
                fund,
                dates: &flow_dates,
                values: &flow_values,
            },
        );

        let growth = if dates.len() < 2 {
            Metric::missing(Fault::NotComputable)
        } else {
            Metric::ok(end_assets / start_assets - 1.0)
        };

        let common = inner_join(net_assets, valuations);
        let bounds = (common.len() >= 2).then(|| (0, common.len() - 1));
        let performance = bounds
            .map(|(a, b)| common.left[a] * (common.right[b] / common.right[a] - 1.0))
            .ok_or(Fault::NotComputable);
        let flow = match (bounds, performance) {
            (Some((a, b)), Ok(p)) => Ok(common.left[b] - common.left[a] - p),
            _ => Err(Fault::NotComputable),
        };

        NetAssetAnalysis {
            start,
            end,
            start_assets,
            end_assets,
            growth,
            cagr: Metric::from(cagr(net_assets)),
            flow_correlation,
            common_dates,
            decomposition_start: bounds.map(|(a, _)| common.dates[a]),
            decomposition_end: bounds.map(|(_, b)| common.dates[b]),
            performance_contribution: Metric::from(performance),
            flow_contribution: Metric::from(flow),
        }
    }
}
