//! Property tests for the analytics invariants.
//!
//! 1. Max drawdown is ≤ 0 and equals the minimum of the drawdown path
//! 2. Transition rows sum to 1; regime centroids are strictly ordered Low < Medium < High
//! 3. Fingerprint scores stay in [0, 100]
//! 4. VaR and CVaR magnitudes are non-negative; VaR₉₅ ≤ VaR₉₉
//! 5. Correlations stay in [-1, 1]
//! 6. Volatility and ulcer index are non-negative

use chrono::{Duration, NaiveDate};
use navrisk_analytics::config::{NormalizationMethod, RegimeConfig};
use navrisk_analytics::correlation::{CorrelationEngine, CorrelationInput};
use navrisk_analytics::drawdown::DrawdownAnalyzer;
use navrisk_analytics::metrics::annualized_volatility;
use navrisk_analytics::regime::{RegimeLabel, VolatilityRegimeClassifier};
use navrisk_analytics::risk_profile::{FundUniverse, RawRiskProfile, RiskFingerprintNormalizer};
use navrisk_analytics::tail_metrics::var_cvar;
use navrisk_core::domain::{Fault, FundId, Metric, ReturnSeries, ValuationSeries};
use proptest::prelude::*;

// ── Strategies ───────────────────────────────────────────────────────

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + Duration::days(i as i64)
}

fn arb_returns(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.08..0.08_f64, min_len..max_len)
}

fn valuations_from(returns: &[f64]) -> ValuationSeries {
    let mut v = 100.0;
    let mut points = vec![(day(0), v)];
    for (i, r) in returns.iter().enumerate() {
        v *= 1.0 + r;
        points.push((day(i + 1), v));
    }
    ValuationSeries::from_points(points).unwrap()
}

fn return_series(returns: &[f64]) -> ReturnSeries {
    ReturnSeries::from_points(returns.iter().enumerate().map(|(i, r)| (day(i + 1), *r))).unwrap()
}

fn arb_dim() -> impl Strategy<Value = Option<f64>> {
    prop::option::weighted(0.85, -5.0..5.0_f64)
}

fn arb_profile(id: usize) -> impl Strategy<Value = RawRiskProfile> {
    (arb_dim(), arb_dim(), arb_dim(), arb_dim(), arb_dim(), arb_dim(), arb_dim()).prop_map(
        move |(a, b, c, d, e, f, g)| RawRiskProfile {
            fund: FundId::new(format!("F{id:03}")),
            stability: a.map(f64::abs),
            resilience: b.map(f64::abs),
            recovery: c.map(f64::abs),
            extreme_protection: d.map(f64::abs),
            asymmetry: e,
            stable_sharpe: f.map(f64::abs),
            pain_ratio: g,
        },
    )
}

fn arb_universe() -> impl Strategy<Value = Vec<RawRiskProfile>> {
    (1usize..12).prop_flat_map(|n| (0..n).map(arb_profile).collect::<Vec<_>>())
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn max_drawdown_is_non_positive(returns in arb_returns(1, 200)) {
        let v = valuations_from(&returns);
        let dd = DrawdownAnalyzer::analyze(&v, Metric::ok(0.0)).unwrap();
        let mdd = dd.max_drawdown.value().unwrap();
        prop_assert!(mdd <= 0.0);
        let path_min = dd.path.iter().map(|p| p.drawdown).fold(0.0_f64, f64::min);
        prop_assert_eq!(mdd, path_min);
        prop_assert!(dd.ulcer_index.value().unwrap() >= 0.0);
        for e in &dd.episodes {
            prop_assert!(e.depth >= mdd);
        }
    }

    #[test]
    fn transition_rows_sum_to_one(returns in arb_returns(40, 300)) {
        let classifier = VolatilityRegimeClassifier::new(RegimeConfig::default(), 252.0);
        if let Ok(a) = classifier.classify(&return_series(&returns)) {
            for row in &a.transitions.probabilities {
                let sum: f64 = row.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-6, "row sums to {}", sum);
            }
            prop_assert!(a.centroids[RegimeLabel::Low.index()] < a.centroids[RegimeLabel::Medium.index()]);
            prop_assert!(a.centroids[RegimeLabel::Medium.index()] < a.centroids[RegimeLabel::High.index()]);
            for s in &a.regimes {
                if a.transitions.row_support(s.regime) == 0 {
                    prop_assert!(s.persistence.is_missing());
                }
            }
        }
    }

    #[test]
    fn fingerprint_scores_are_bounded(profiles in arb_universe(), rank in any::<bool>()) {
        let method = if rank { NormalizationMethod::Rank } else { NormalizationMethod::MinMax };
        let universe = FundUniverse::new(profiles);
        let fps = RiskFingerprintNormalizer::new(method).normalize(&universe);
        prop_assert_eq!(fps.len(), universe.len());
        for fp in &fps {
            for s in &fp.scores {
                if let Some(v) = s.score.value() {
                    prop_assert!((0.0..=100.0).contains(&v));
                }
            }
            if let Some(g) = fp.global_score.value() {
                prop_assert!((0.0..=100.0).contains(&g));
            }
        }
    }

    #[test]
    fn var_grows_with_confidence(returns in arb_returns(2, 300)) {
        let (v95, c95) = var_cvar(&returns, 0.95).unwrap();
        let (v99, c99) = var_cvar(&returns, 0.99).unwrap();
        prop_assert!(v95 >= 0.0 && c95 >= 0.0);
        prop_assert!(v95 <= v99 + 1e-12);
        prop_assert!(c95 <= c99 + 1e-12);
        prop_assert!(annualized_volatility(&returns, 252.0).unwrap() >= 0.0);
    }

    #[test]
    fn correlation_is_bounded(a in arb_returns(10, 80), b in arb_returns(10, 80)) {
        let fa = FundId::from("A");
        let fb = FundId::from("B");
        let da: Vec<NaiveDate> = (0..a.len()).map(day).collect();
        let db: Vec<NaiveDate> = (0..b.len()).map(day).collect();
        let (m, overlap) = CorrelationEngine::new(10).pair(
            &CorrelationInput { fund: &fa, dates: &da, values: &a },
            &CorrelationInput { fund: &fb, dates: &db, values: &b },
        );
        prop_assert_eq!(overlap, a.len().min(b.len()));
        if let Some(c) = m.value() {
            prop_assert!((-1.0..=1.0).contains(&c));
        }
    }
}

#[test]
fn constant_volatility_has_no_regimes() {
    let classifier = VolatilityRegimeClassifier::new(RegimeConfig::default(), 252.0);
    let err = classifier.classify(&return_series(&[0.004; 120])).unwrap_err();
    assert_eq!(err, Fault::Undefined);
}

#[test]
fn single_fund_universe_scores_fifty() {
    let profile = RawRiskProfile {
        fund: FundId::from("ONLY"),
        stability: Some(0.12),
        resilience: Some(0.3),
        recovery: Some(14.0),
        extreme_protection: Some(0.025),
        asymmetry: Some(0.0),
        stable_sharpe: Some(0.7),
        pain_ratio: Some(0.9),
    };
    let fps = RiskFingerprintNormalizer::new(NormalizationMethod::MinMax).normalize(&FundUniverse::new(vec![profile]));
    assert!(fps[0].scores.iter().all(|s| s.score == Metric::ok(50.0)));
    assert_eq!(fps[0].global_score, Metric::ok(50.0));
}
