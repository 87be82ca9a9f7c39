//! Drawdown episodes and the pain statistics derived from the drawdown path.
//!
//! `drawdown(t) = value(t) / running_max(t) − 1`. An episode opens on the first
//! negative drawdown after being at a peak, bottoms at its most negative point,
//! and closes on the first date the value is back at or above the prior peak.

use chrono::NaiveDate;
use navrisk_core::domain::{DatedSeries, Fault, Metric, ValuationSeries};
use navrisk_core::stats::{mean, ZERO_TOLERANCE};
use serde::{Deserialize, Serialize};

/// One peak-to-recovery episode. `end` and `recovery_periods` are `None` while open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    /// Last date at the prior peak.
    pub peak: NaiveDate,
    /// First underwater date.
    pub start: NaiveDate,
    pub trough: NaiveDate,
    pub end: Option<NaiveDate>,
    /// Trough drawdown as a negative fraction (−0.2 is a 20% fall).
    pub depth: f64,
    /// Underwater observations.
    pub duration_periods: usize,
    /// Observations from trough to recovery.
    pub recovery_periods: Option<usize>,
}

impl DrawdownEpisode {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub episodes: Vec<DrawdownEpisode>,
    pub path: Vec<DrawdownPoint>,
    /// Most negative drawdown (≤ 0).
    pub max_drawdown: Metric,
    /// Mean of the strictly negative drawdown values (0 if never underwater).
    pub average_drawdown: Metric,
    pub current_drawdown: Metric,
    /// RMS of the full drawdown path (≥ 0).
    pub ulcer_index: Metric,
    /// Annualized return ÷ Ulcer Index.
    pub pain_ratio: Metric,
    /// Mean trough-to-recovery length over closed episodes.
    pub average_recovery_periods: Metric,
    pub longest_duration_periods: usize,
}

/// Drawdown path: one value per observation, all ≤ 0.
pub fn drawdown_path(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            if peak > 0.0 {
                (v / peak - 1.0).min(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Split a drawdown path into episodes.
pub fn detect_episodes(dates: &[NaiveDate], path: &[f64]) -> Vec<DrawdownEpisode> {
    let mut episodes = Vec::new();
    let mut open: Option<(usize, usize)> = None; // (start idx, trough idx)

    for (i, &dd) in path.iter().enumerate() {
        match open {
            None if dd < 0.0 => open = Some((i, i)),
            None => {}
            Some((start, trough)) if dd < 0.0 => {
                if dd < path[trough] {
                    open = Some((start, i));
                }
            }
            Some((start, trough)) => {
                episodes.push(DrawdownEpisode {
                    peak: dates[start.saturating_sub(1)],
                    start: dates[start],
                    trough: dates[trough],
                    end: Some(dates[i]),
                    depth: path[trough],
                    duration_periods: i - start,
                    recovery_periods: Some(i - trough),
                });
                open = None;
            }
        }
    }

    if let Some((start, trough)) = open {
        episodes.push(DrawdownEpisode {
            peak: dates[start.saturating_sub(1)],
            start: dates[start],
            trough: dates[trough],
            end: None,
            depth: path[trough],
            duration_periods: path.len() - start,
            recovery_periods: None,
        });
    }
    episodes
}

/// Root-mean-square of the drawdown path.
pub fn ulcer_index(path: &[f64]) -> Result<f64, Fault> {
    if path.is_empty() {
        return Err(Fault::NotComputable);
    }
    let ms = path.iter().map(|d| d * d).sum::<f64>() / path.len() as f64;
    Ok(ms.sqrt())
}

/// `annualized_return / ulcer`; undefined when never underwater.
pub fn pain_ratio(annualized_return: Metric, ulcer: Metric) -> Metric {
    let (Some(ret), Some(ui)) = (annualized_return.value(), ulcer.value()) else {
        let fault = annualized_return
            .fault()
            .or(ulcer.fault())
            .unwrap_or(Fault::NotComputable);
        return Metric::missing(fault);
    };
    if ui < ZERO_TOLERANCE {
        return Metric::missing(Fault::Undefined);
    }
    Metric::ok(ret / ui)
}

pub struct DrawdownAnalyzer;

impl DrawdownAnalyzer {
    pub fn analyze(
        valuations: &ValuationSeries,
        annualized_return: Metric,
    ) -> Result<DrawdownAnalysis, Fault> {
        if valuations.is_empty() {
            return Err(Fault::NotComputable);
        }
        let dd = drawdown_path(valuations.values());
        let episodes = detect_episodes(valuations.dates(), &dd);

        let max_drawdown = dd.iter().copied().fold(0.0_f64, f64::min);
        let underwater: Vec<f64> = dd.iter().copied().filter(|d| *d < 0.0).collect();
        let average_drawdown = mean(&underwater).unwrap_or(0.0);
        let ulcer = Metric::from(ulcer_index(&dd));

        let recoveries: Vec<f64> = episodes
            .iter()
            .filter_map(|e| e.recovery_periods.map(|p| p as f64))
            .collect();
        let average_recovery_periods = if episodes.is_empty() {
            Metric::ok(0.0)
        } else {
            mean(&recoveries).map_or(Metric::missing(Fault::NotComputable), Metric::ok)
        };

        let longest_duration_periods = episodes.iter().map(|e| e.duration_periods).max().unwrap_or(0);
        let current_drawdown = dd.last().copied().unwrap_or(0.0);

        tracing::debug!(
            episodes = episodes.len(),
            max_drawdown,
            "drawdown analysis complete"
        );

        Ok(DrawdownAnalysis {
            path: valuations
                .dates()
                .iter()
                .zip(&dd)
                .map(|(date, drawdown)| DrawdownPoint {
                    date: *date,
                    drawdown: *drawdown,
                })
                .collect(),
            episodes,
            max_drawdown: Metric::ok(max_drawdown),
            average_drawdown: Metric::ok(average_drawdown),
            current_drawdown: Metric::ok(current_drawdown),
            pain_ratio: pain_ratio(annualized_return, ulcer),
            ulcer_index: ulcer,
            average_recovery_periods,
            longest_duration_periods,
        })
    }
}
