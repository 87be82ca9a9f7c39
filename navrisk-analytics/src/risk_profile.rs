//! Risk fingerprint: seven raw risk dimensions per fund, scored 0–100
//! relative to the fund universe they are compared against.
//!
//! Phase 1 builds a [`RawRiskProfile`] per fund, independently. Phase 2 takes
//! an immutable [`FundUniverse`] snapshot of every raw profile and scores each
//! dimension across it. Changing universe membership changes every score, so
//! the normalizer always runs over the whole snapshot.
//!
//! Orientation before scaling: dimensions where lower is better (volatility,
//! drawdown magnitude, recovery time, CVaR magnitude, Sharpe dispersion) are
//! negated. Asymmetry is not universe-relative: `50 + 25 × skewness`, clamped.

use navrisk_core::domain::{Fault, FundId, Metric};
use navrisk_core::stats::ZERO_TOLERANCE;
use serde::{Deserialize, Serialize};

use crate::config::NormalizationMethod;
use crate::drawdown::DrawdownAnalysis;
use crate::metrics::RiskMetrics;
use crate::rolling::RollingRiskIndicators;

/// Score given to every fund on a dimension with no spread across the universe.
pub const NEUTRAL_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDimension {
    /// Annualized volatility.
    Stability,
    /// Max drawdown magnitude.
    Resilience,
    /// Average recovery time of closed drawdown episodes, in periods.
    Recovery,
    /// CVaR magnitude.
    ExtremeProtection,
    /// Skewness of returns.
    Asymmetry,
    /// Dispersion of the rolling Sharpe ratio.
    StableSharpe,
    PainRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    HigherIsBetter,
    LowerIsBetter,
    Bounded,
}

impl RiskDimension {
    pub const ALL: [RiskDimension; 7] = [
        RiskDimension::Stability,
        RiskDimension::Resilience,
        RiskDimension::Recovery,
        RiskDimension::ExtremeProtection,
        RiskDimension::Asymmetry,
        RiskDimension::StableSharpe,
        RiskDimension::PainRatio,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskDimension::Stability => "Stability",
            RiskDimension::Resilience => "Resilience",
            RiskDimension::Recovery => "Recovery",
            RiskDimension::ExtremeProtection => "Extreme protection",
            RiskDimension::Asymmetry => "Asymmetry",
            RiskDimension::StableSharpe => "Stable Sharpe",
            RiskDimension::PainRatio => "Pain ratio",
        }
    }

    fn orientation(self) -> Orientation {
        match self {
            RiskDimension::Asymmetry => Orientation::Bounded,
            RiskDimension::PainRatio => Orientation::HigherIsBetter,
            _ => Orientation::LowerIsBetter,
        }
    }
}

/// Unoriented raw values. `None` means the fund could not produce the dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRiskProfile {
    pub fund: FundId,
    pub stability: Option<f64>,
    pub resilience: Option<f64>,
    pub recovery: Option<f64>,
    pub extreme_protection: Option<f64>,
    pub asymmetry: Option<f64>,
    pub stable_sharpe: Option<f64>,
    pub pain_ratio: Option<f64>,
}

impl RawRiskProfile {
    /// Missing raw profile, for funds whose series was not computable.
    pub fn empty(fund: FundId) -> Self {
        Self {
            fund,
            stability: None,
            resilience: None,
            recovery: None,
            extreme_protection: None,
            asymmetry: None,
            stable_sharpe: None,
            pain_ratio: None,
        }
    }

    pub fn from_analyses(
        fund: FundId,
        metrics: &RiskMetrics,
        drawdown: Option<&DrawdownAnalysis>,
        rolling: &RollingRiskIndicators,
    ) -> Self {
        let finite = |m: Metric| m.value().filter(|v| v.is_finite());
        Self {
            fund,
            stability: finite(metrics.volatility),
            resilience: drawdown.and_then(|d| finite(d.max_drawdown)).map(f64::abs),
            recovery: drawdown.and_then(|d| finite(d.average_recovery_periods)),
            extreme_protection: finite(metrics.tail.cvar).map(f64::abs),
            asymmetry: finite(metrics.tail.skewness),
            stable_sharpe: finite(rolling.sharpe_stability),
            pain_ratio: drawdown.and_then(|d| finite(d.pain_ratio)),
        }
    }

    pub fn get(&self, dimension: RiskDimension) -> Option<f64> {
        match dimension {
            RiskDimension::Stability => self.stability,
            RiskDimension::Resilience => self.resilience,
            RiskDimension::Recovery => self.recovery,
            RiskDimension::ExtremeProtection => self.extreme_protection,
            RiskDimension::Asymmetry => self.asymmetry,
            RiskDimension::StableSharpe => self.stable_sharpe,
            RiskDimension::PainRatio => self.pain_ratio,
        }
    }
}

/// Immutable snapshot of every raw profile being compared, ordered by fund id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundUniverse {
    profiles: Vec<RawRiskProfile>,
}

impl FundUniverse {
    /// Later duplicates of a fund id replace earlier ones.
    pub fn new(profiles: Vec<RawRiskProfile>) -> Self {
        let mut profiles = profiles;
        profiles.reverse();
        profiles.sort_by(|a, b| a.fund.cmp(&b.fund));
        profiles.dedup_by(|later, earlier| later.fund == earlier.fund);
        Self { profiles }
    }

    pub fn profiles(&self) -> &[RawRiskProfile] {
        &self.profiles
    }

    pub fn funds(&self) -> impl Iterator<Item = &FundId> {
        self.profiles.iter().map(|p| &p.fund)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: RiskDimension,
    pub score: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFingerprint {
    pub raw: RawRiskProfile,
    pub scores: Vec<DimensionScore>,
    /// Mean of the available dimension scores; flagged `LowConfidence` when
    /// any dimension is missing.
    pub global_score: Metric,
}

impl RiskFingerprint {
    pub fn fund(&self) -> &FundId {
        &self.raw.fund
    }

    pub fn score(&self, dimension: RiskDimension) -> Option<Metric> {
        self.scores.iter().find(|s| s.dimension == dimension).map(|s| s.score)
    }
}

pub struct RiskFingerprintNormalizer {
    method: NormalizationMethod,
}

impl RiskFingerprintNormalizer {
    pub fn new(method: NormalizationMethod) -> Self {
        Self { method }
    }

    /// Scores every fund in the universe, in universe order.
    pub fn normalize(&self, universe: &FundUniverse) -> Vec<RiskFingerprint> {
        let n = universe.len();
        let mut columns: Vec<Vec<Metric>> = Vec::with_capacity(RiskDimension::ALL.len());
        for dimension in RiskDimension::ALL {
            let raw: Vec<Option<f64>> = universe.profiles().iter().map(|p| p.get(dimension)).collect();
            columns.push(self.score_dimension(dimension, &raw));
        }

        let fingerprints: Vec<RiskFingerprint> = (0..n)
            .map(|i| {
                let scores: Vec<DimensionScore> = RiskDimension::ALL
                    .iter()
                    .zip(&columns)
                    .map(|(&dimension, column)| DimensionScore {
                        dimension,
                        score: column[i],
                    })
                    .collect();
                let global_score = global_score(&scores);
                RiskFingerprint {
                    raw: universe.profiles()[i].clone(),
                    scores,
                    global_score,
                }
            })
            .collect();

        tracing::debug!(funds = n, method = ?self.method, "risk fingerprints normalized");
        fingerprints
    }

    fn score_dimension(&self, dimension: RiskDimension, raw: &[Option<f64>]) -> Vec<Metric> {
        let missing = Metric::missing(Fault::NotComputable);
        let orientation = dimension.orientation();

        if orientation == Orientation::Bounded {
            return raw
                .iter()
                .map(|v| v.map_or(missing, |s| Metric::ok((NEUTRAL_SCORE + 25.0 * s).clamp(0.0, 100.0))))
                .collect();
        }

        let sign = if orientation == Orientation::LowerIsBetter { -1.0 } else { 1.0 };
        let present: Vec<(usize, f64)> = raw
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, sign * v)))
            .collect();
        let oriented: Vec<f64> = present.iter().map(|(_, v)| *v).collect();

        let scaled = match self.method {
            NormalizationMethod::MinMax => min_max_scale(&oriented),
            NormalizationMethod::Rank => rank_normalize(&oriented).into_iter().map(|r| r * 100.0).collect(),
        };

        let mut out = vec![missing; raw.len()];
        for ((i, _), score) in present.iter().zip(scaled) {
            out[*i] = Metric::ok(score.clamp(0.0, 100.0));
        }
        out
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn global_score(scores: &[DimensionScore]) -> Metric {
    let available: Vec<f64> = scores.iter().filter_map(|s| s.score.value()).collect();
    if available.is_empty() {
        return Metric::missing(Fault::NotComputable);
    }
    let mean = available.iter().sum::<f64>() / available.len() as f64;
    if available.len() < scores.len() {
        Metric::flagged(mean, Fault::LowConfidence)
    } else {
        Metric::ok(mean)
    }
}

/// `100 × (v − min) / (max − min)`; every value gets 50 when there is no spread.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range < ZERO_TOLERANCE {
        return vec![NEUTRAL_SCORE; values.len()];
    }
    values.iter().map(|v| 100.0 * (v - min) / range).collect()
}

/// Percentile rank of each value in [0, 1], ties sharing their average rank.
///
/// A single value ranks 0.5.
pub fn rank_normalize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![0.5],
        _ => {}
    }

    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0_f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && (indexed[j].1 - indexed[i].1).abs() < ZERO_TOLERANCE {
            j += 1;
        }
        // 1-based average rank of the tied run
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for (idx, _) in &indexed[i..j] {
            ranks[*idx] = avg_rank;
        }
        i = j;
    }

    ranks.iter().map(|r| (r - 1.0) / (n as f64 - 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, vol: f64, mdd: f64, skew: f64) -> RawRiskProfile {
        RawRiskProfile {
            fund: FundId::from(id),
            stability: Some(vol),
            resilience: Some(mdd),
            recovery: Some(10.0),
            extreme_protection: Some(0.03),
            asymmetry: Some(skew),
            stable_sharpe: Some(0.4),
            pain_ratio: Some(1.2),
        }
    }

    fn min_max() -> RiskFingerprintNormalizer {
        RiskFingerprintNormalizer::new(NormalizationMethod::MinMax)
    }

    #[test]
    fn single_fund_is_neutral() {
        let universe = FundUniverse::new(vec![profile("A", 0.15, 0.2, 0.5)]);
        let fp = &min_max().normalize(&universe)[0];
        for s in &fp.scores {
            if s.dimension == RiskDimension::Asymmetry {
                assert_eq!(s.score, Metric::ok(62.5));
            } else {
                assert_eq!(s.score, Metric::ok(NEUTRAL_SCORE));
            }
        }
        assert!(fp.global_score.is_ok());
    }

    #[test]
    fn lower_volatility_scores_higher() {
        let universe = FundUniverse::new(vec![
            profile("A", 0.10, 0.2, 0.0),
            profile("B", 0.20, 0.1, 0.0),
            profile("C", 0.15, 0.3, 0.0),
        ]);
        let fps = min_max().normalize(&universe);
        let stab = |i: usize| fps[i].score(RiskDimension::Stability).unwrap().value().unwrap();
        assert_eq!(stab(0), 100.0);
        assert_eq!(stab(1), 0.0);
        assert!((stab(2) - 50.0).abs() < 1e-9);
        let res = fps[1].score(RiskDimension::Resilience).unwrap().value().unwrap();
        assert_eq!(res, 100.0);
    }

    #[test]
    fn asymmetry_is_clamped() {
        let universe = FundUniverse::new(vec![profile("A", 0.1, 0.1, 3.0), profile("B", 0.1, 0.1, -5.0)]);
        let fps = min_max().normalize(&universe);
        assert_eq!(fps[0].score(RiskDimension::Asymmetry), Some(Metric::ok(100.0)));
        assert_eq!(fps[1].score(RiskDimension::Asymmetry), Some(Metric::ok(0.0)));
    }

    #[test]
    fn missing_dimension_is_excluded_from_scaling() {
        let mut b = profile("B", 0.30, 0.1, 0.0);
        b.pain_ratio = None;
        let universe = FundUniverse::new(vec![
            profile("A", 0.10, 0.1, 0.0),
            b,
            RawRiskProfile {
                pain_ratio: Some(3.0),
                ..profile("C", 0.20, 0.1, 0.0)
            },
        ]);
        let fps = min_max().normalize(&universe);
        assert_eq!(
            fps[1].score(RiskDimension::PainRatio),
            Some(Metric::missing(Fault::NotComputable))
        );
        assert_eq!(fps[0].score(RiskDimension::PainRatio), Some(Metric::ok(0.0)));
        assert_eq!(fps[2].score(RiskDimension::PainRatio), Some(Metric::ok(100.0)));
        assert_eq!(fps[1].global_score.fault(), Some(Fault::LowConfidence));
    }

    #[test]
    fn empty_profile_has_no_global_score() {
        let universe = FundUniverse::new(vec![RawRiskProfile::empty(FundId::from("X"))]);
        let fp = &min_max().normalize(&universe)[0];
        assert_eq!(fp.global_score, Metric::missing(Fault::NotComputable));
    }

    #[test]
    fn universe_is_sorted_and_deduplicated() {
        let universe = FundUniverse::new(vec![
            profile("B", 0.1, 0.1, 0.0),
            profile("A", 0.1, 0.1, 0.0),
            profile("B", 0.2, 0.1, 0.0),
        ]);
        let ids: Vec<&str> = universe.funds().map(|f| f.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(universe.profiles()[1].stability, Some(0.2));
    }

    #[test]
    fn rank_normalize_averages_ties() {
        let r = rank_normalize(&[3.0, 1.0, 3.0, 2.0]);
        // sorted: 1, 2, 3, 3 -> ranks 1, 2, 3.5, 3.5
        assert!((r[1] - 0.0).abs() < 1e-12);
        assert!((r[3] - 1.0 / 3.0).abs() < 1e-12);
        assert!((r[0] - 2.5 / 3.0).abs() < 1e-12);
        assert_eq!(r[0], r[2]);
        assert_eq!(rank_normalize(&[7.0]), vec![0.5]);
        assert!(rank_normalize(&[]).is_empty());
    }

    #[test]
    fn rank_method_single_fund_is_neutral() {
        let universe = FundUniverse::new(vec![profile("A", 0.15, 0.2, 0.0)]);
        let fp = &RiskFingerprintNormalizer::new(NormalizationMethod::Rank).normalize(&universe)[0];
        assert!(fp.scores.iter().all(|s| s.score == Metric::ok(NEUTRAL_SCORE)));
    }

    #[test]
    fn min_max_degenerate() {
        assert_eq!(min_max_scale(&[2.0, 2.0]), vec![50.0, 50.0]);
        assert!(min_max_scale(&[]).is_empty());
    }
}
