//! Calendar, trailing and seasonal performance of a valuation series.

use chrono::{Datelike, Duration, NaiveDate};
use navrisk_core::domain::{DatedSeries, Fault, Metric, ValuationSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Period-to-date windows, anchored on the last observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarPeriod {
    WeekToDate,
    MonthToDate,
    QuarterToDate,
    SemesterToDate,
    YearToDate,
}

impl CalendarPeriod {
    pub const ALL: [CalendarPeriod; 5] = [
        CalendarPeriod::WeekToDate,
        CalendarPeriod::MonthToDate,
        CalendarPeriod::QuarterToDate,
        CalendarPeriod::SemesterToDate,
        CalendarPeriod::YearToDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CalendarPeriod::WeekToDate => "WTD",
            CalendarPeriod::MonthToDate => "MTD",
            CalendarPeriod::QuarterToDate => "QTD",
            CalendarPeriod::SemesterToDate => "STD",
            CalendarPeriod::YearToDate => "YTD",
        }
    }

    /// First calendar day of the period containing `date`.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        let first_of = |month: u32| NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date);
        match self {
            CalendarPeriod::WeekToDate => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            CalendarPeriod::MonthToDate => first_of(date.month()),
            CalendarPeriod::QuarterToDate => first_of((date.month() - 1) / 3 * 3 + 1),
            CalendarPeriod::SemesterToDate => first_of(if date.month() <= 6 { 1 } else { 7 }),
            CalendarPeriod::YearToDate => first_of(1),
        }
    }
}

/// Trailing windows in calendar days, plus since inception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingPeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    FiveYears,
    SinceInception,
}

impl TrailingPeriod {
    pub const ALL: [TrailingPeriod; 6] = [
        TrailingPeriod::OneMonth,
        TrailingPeriod::ThreeMonths,
        TrailingPeriod::SixMonths,
        TrailingPeriod::OneYear,
        TrailingPeriod::FiveYears,
        TrailingPeriod::SinceInception,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TrailingPeriod::OneMonth => "1M",
            TrailingPeriod::ThreeMonths => "3M",
            TrailingPeriod::SixMonths => "6M",
            TrailingPeriod::OneYear => "1Y",
            TrailingPeriod::FiveYears => "5Y",
            TrailingPeriod::SinceInception => "Origin",
        }
    }

    pub fn days(self) -> Option<i64> {
        match self {
            TrailingPeriod::OneMonth => Some(30),
            TrailingPeriod::ThreeMonths => Some(90),
            TrailingPeriod::SixMonths => Some(180),
            TrailingPeriod::OneYear => Some(365),
            TrailingPeriod::FiveYears => Some(1825),
            TrailingPeriod::SinceInception => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn<P> {
    pub period: P,
    pub start: Option<NaiveDate>,
    pub value: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBucket {
    /// Calendar month (1–12) or quarter (1–4).
    pub period: u32,
    pub mean_return: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub as_of: NaiveDate,
    pub calendar: Vec<PeriodReturn<CalendarPeriod>>,
    pub trailing: Vec<PeriodReturn<TrailingPeriod>>,
    /// Calendar-day compound annual growth rate.
    pub cagr: Metric,
    pub monthly_seasonality: Vec<SeasonalBucket>,
    pub quarterly_seasonality: Vec<SeasonalBucket>,
}

/// Return from the first observation on or after `start` to the last observation.
fn return_since(series: &ValuationSeries, start: NaiveDate) -> (Option<NaiveDate>, Metric) {
    let (Some(last), Some(i)) = (series.last_value(), series.index_on_or_after(start)) else {
        return (None, Metric::missing(Fault::NotComputable));
    };
    (Some(series.dates()[i]), Metric::ok(last / series.values()[i] - 1.0))
}

pub fn calendar_returns(series: &ValuationSeries) -> Vec<PeriodReturn<CalendarPeriod>> {
    let Some(as_of) = series.last_date() else {
        return Vec::new();
    };
    CalendarPeriod::ALL
        .iter()
        .map(|&period| {
            let (start, value) = return_since(series, period.period_start(as_of));
            PeriodReturn { period, start, value }
        })
        .collect()
}

pub fn trailing_returns(series: &ValuationSeries) -> Vec<PeriodReturn<TrailingPeriod>> {
    let (Some(first), Some(as_of)) = (series.first_date(), series.last_date()) else {
        return Vec::new();
    };
    TrailingPeriod::ALL
        .iter()
        .map(|&period| {
            let start = period.days().map_or(first, |d| as_of - Duration::days(d));
            if start < first {
                return PeriodReturn {
                    period,
                    start: None,
                    value: Metric::missing(Fault::NotComputable),
                };
            }
            let (start, value) = return_since(series, start);
            PeriodReturn { period, start, value }
        })
        .collect()
}

/// `(last / first)^(365.25 / days) − 1` over calendar days.
pub fn cagr(series: &ValuationSeries) -> Result<f64, Fault> {
    let (Some(d0), Some(d1), Some(v0), Some(v1)) = (
        series.first_date(),
        series.last_date(),
        series.first_value(),
        series.last_value(),
    ) else {
        return Err(Fault::NotComputable);
    };
    let days = (d1 - d0).num_days();
    if days <= 0 {
        return Err(Fault::NotComputable);
    }
    Ok((v1 / v0).powf(365.25 / days as f64) - 1.0)
}

/// Month-end to month-end returns keyed by (year, month) of the later month end.
/// Only consecutive calendar months pair up; a gap of a month or more yields
/// no return.
pub fn monthly_returns(series: &ValuationSeries) -> Vec<((i32, u32), f64)> {
    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, value) in series.iter() {
        month_end.insert((date.year(), date.month()), value);
    }
    let ends: Vec<((i32, u32), f64)> = month_end.into_iter().collect();
    ends.windows(2)
        .filter(|w| next_month(w[0].0) == w[1].0)
        .map(|w| (w[1].0, w[1].1 / w[0].1 - 1.0))
        .collect()
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn seasonal(monthly: &[((i32, u32), f64)], key: impl Fn(u32) -> u32) -> Vec<SeasonalBucket> {
    let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for ((_, month), r) in monthly {
        let e = acc.entry(key(*month)).or_insert((0.0, 0));
        e.0 += r;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(period, (sum, n))| SeasonalBucket {
            period,
            mean_return: sum / n as f64,
            observations: n,
        })
        .collect()
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn compute(series: &ValuationSeries) -> Result<PerformanceReport, Fault> {
        let as_of = series.last_date().ok_or(Fault::NotComputable)?;
        let monthly = monthly_returns(series);
        Ok(PerformanceReport {
            as_of,
            calendar: calendar_returns(series),
            trailing: trailing_returns(series),
            cagr: Metric::from(cagr(series)),
            monthly_seasonality: seasonal(&monthly, |m| m),
            quarterly_seasonality: seasonal(&monthly, |m| (m - 1) / 3 + 1),
        })
    }
}
