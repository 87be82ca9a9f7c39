//! Two-phase universe analysis.
//!
//! Phase 1 runs every per-fund analyzer independently (parallel over funds).
//! Collecting phase 1 is the barrier: it yields the immutable `FundUniverse`
//! and the return map. Phase 2 then computes peer-average capture, the
//! correlation matrices and the normalized fingerprints over that snapshot.

use std::collections::BTreeMap;
use std::time::Instant;

use navrisk_core::domain::{
    DatasetHash, DatedSeries, Fault, FlowSeries, FundId, Metric, RawObservation, ReturnSeries, ValuationSeries,
};
use navrisk_core::SeriesPreparer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::capture::{peer_average, BenchmarkSource, CaptureRatioCalculator};
use crate::config::AnalyticsConfig;
use crate::correlation::{CorrelationEngine, CorrelationInput, CorrelationMatrix};
use crate::drawdown::DrawdownAnalyzer;
use crate::flows::{flow_concentration, FlowAnalyzer};
use crate::loss_probability::LossProbabilityEstimator;
use crate::metrics::{annualized_return, RiskMetrics};
use crate::performance::PerformanceCalculator;
use crate::regime::VolatilityRegimeClassifier;
use crate::report::{FundReport, RunManifest, UniverseReport, SCHEMA_VERSION};
use crate::risk_profile::{FundUniverse, RawRiskProfile, RiskFingerprintNormalizer};
use crate::rolling::compute_rolling;

/// Raw inputs for one fund, as supplied by the ingestion side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundInput {
    pub fund: FundId,
    pub valuations: Vec<RawObservation>,
    pub net_assets: Option<ValuationSeries>,
    pub flows: Option<FlowSeries>,
}

impl FundInput {
    pub fn new(fund: FundId, valuations: Vec<RawObservation>) -> Self {
        Self {
            fund,
            valuations,
            net_assets: None,
            flows: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniverseInput {
    pub funds: Vec<FundInput>,
    /// When absent, each fund is compared with the average of its peers.
    pub benchmark: Option<ReturnSeries>,
}

impl UniverseInput {
    /// BLAKE3 over the canonical JSON of all inputs, funds ordered by id.
    pub fn dataset_hash(&self) -> DatasetHash {
        let mut funds: Vec<&FundInput> = self.funds.iter().collect();
        funds.sort_by(|a, b| a.fund.cmp(&b.fund));
        let mut hasher = blake3::Hasher::new();
        for f in funds {
            hasher.update(serde_json::to_string(f).unwrap_or_default().as_bytes());
        }
        hasher.update(serde_json::to_string(&self.benchmark).unwrap_or_default().as_bytes());
        DatasetHash(hasher.finalize().to_hex().to_string())
    }
}

/// Phase-1 output kept for the cross-fund phase.
struct FundStage {
    report: FundReport,
    returns: ReturnSeries,
}

pub struct AnalysisPipeline {
    config: AnalyticsConfig,
    parallel: bool,
}

impl AnalysisPipeline {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution across funds.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Analyze one fund on its own. Capture uses `benchmark` when given and
    /// is `NotComputable` otherwise.
    pub fn analyze_fund(&self, input: &FundInput, benchmark: Option<&ReturnSeries>) -> FundReport {
        self.stage_fund(input, benchmark).report
    }

    pub fn analyze_universe(&self, input: &UniverseInput) -> UniverseReport {
        let started = Instant::now();
        tracing::info!(funds = input.funds.len(), parallel = self.parallel, "phase 1: per-fund analysis");

        let benchmark = input.benchmark.as_ref();
        let mut stages: Vec<FundStage> = if self.parallel {
            input.funds.par_iter().map(|f| self.stage_fund(f, benchmark)).collect()
        } else {
            input.funds.iter().map(|f| self.stage_fund(f, benchmark)).collect()
        };
        stages.sort_by(|a, b| a.report.fund.cmp(&b.report.fund));

        tracing::info!("phase 2: cross-fund analysis");
        if benchmark.is_none() {
            self.peer_capture(&mut stages);
        }

        let correlation = self.return_correlation(&stages);
        let flow_correlation = self.flow_correlation(&stages);
        let net_by_fund: Vec<(FundId, f64)> = stages
            .iter()
            .filter_map(|s| {
                let flows = s.report.flows.as_ref().filter(|f| f.record_count > 0)?;
                Some((s.report.fund.clone(), flows.net_flow))
            })
            .collect();
        let flow_concentration = flow_concentration(&net_by_fund);

        let universe = FundUniverse::new(stages.iter().map(|s| s.report.risk_profile.clone()).collect());
        let fingerprints = RiskFingerprintNormalizer::new(self.config.fingerprint.method).normalize(&universe);

        let manifest = RunManifest {
            schema_version: SCHEMA_VERSION,
            config_hash: self.config.config_hash(),
            dataset_hash: input.dataset_hash(),
            seed: self.config.loss.seed,
            fund_count: stages.len(),
        };

        tracing::info!(
            funds = stages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "universe analysis complete"
        );

        UniverseReport {
            manifest,
            funds: stages.into_iter().map(|s| s.report).collect(),
            correlation,
            flow_correlation,
            flow_concentration,
            fingerprints,
        }
    }

    // ─── Phase 1 ─────────────────────────────────────────────────────

    fn stage_fund(&self, input: &FundInput, benchmark: Option<&ReturnSeries>) -> FundStage {
        let started = Instant::now();
        let fund = &input.fund;
        let cfg = &self.config;
        let preparer = SeriesPreparer::new(cfg.series.min_observations);

        let full = preparer.prepare(fund, &input.valuations);
        if let Some(fault) = full.fault {
            tracing::warn!(fund = %fund, observations = full.valuations.len(), "fund not computable");
            return FundStage {
                report: FundReport::not_computable(fund.clone(), full.valuations.len(), full.issues, fault),
                returns: ReturnSeries::empty(),
            };
        }

        // Regime semantics are defined over the whole history.
        let regime = VolatilityRegimeClassifier::new(cfg.regime.clone(), cfg.risk.periods_per_year)
            .with_risk_free_rate(cfg.risk.risk_free_rate)
            .classify(&full.returns);

        let windowed = full.restrict(&cfg.series.window(), preparer.min_observations());
        if let Some(fault) = windowed.fault {
            tracing::warn!(fund = %fund, observations = windowed.valuations.len(), "fund not computable in window");
            let mut report =
                FundReport::not_computable(fund.clone(), windowed.valuations.len(), windowed.issues, fault);
            report.regime = regime;
            return FundStage {
                report,
                returns: ReturnSeries::empty(),
            };
        }

        let risk = &cfg.risk;
        let returns = &windowed.returns;
        let valuations = &windowed.valuations;

        let ann = Metric::from(annualized_return(returns.values(), risk.periods_per_year));
        let drawdown = DrawdownAnalyzer::analyze(valuations, ann);
        let mdd = drawdown
            .as_ref()
            .map_or(Metric::missing(Fault::NotComputable), |d| d.max_drawdown);
        let metrics = RiskMetrics::compute(returns, mdd, risk);
        let rolling = compute_rolling(returns, risk.rolling_window, risk.periods_per_year, risk.confidence_level);
        let performance = PerformanceCalculator::compute(valuations);
        let loss = LossProbabilityEstimator::new(cfg.loss.clone()).estimate(fund, returns, valuations);

        let capture = match benchmark {
            Some(b) => Ok(CaptureRatioCalculator::compute(returns, b, BenchmarkSource::Supplied)),
            None => Err(Fault::NotComputable),
        };

        let flows = (input.flows.is_some() || input.net_assets.is_some()).then(|| {
            let window = cfg.series.window();
            let series = input.flows.as_ref().map(|f| f.restrict(&window)).unwrap_or_default();
            let net_assets = input.net_assets.as_ref().map(|na| na.restrict(&window));
            FlowAnalyzer::new(cfg.correlation.min_overlap).analyze(fund, &series, net_assets.as_ref(), valuations)
        });

        let risk_profile = RawRiskProfile::from_analyses(fund.clone(), &metrics, drawdown.as_ref().ok(), &rolling);

        tracing::debug!(
            fund = %fund,
            observations = valuations.len(),
            issues = windowed.issues.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "fund analysis complete"
        );

        FundStage {
            report: FundReport {
                fund: fund.clone(),
                observations: valuations.len(),
                data_issues: windowed.issues.clone(),
                fault: None,
                metrics: Ok(metrics),
                drawdown,
                performance,
                rolling: Ok(rolling),
                regime,
                capture,
                loss: Ok(loss),
                flows,
                risk_profile,
            },
            returns: windowed.returns,
        }
    }

    // ─── Phase 2 ─────────────────────────────────────────────────────

    fn peer_capture(&self, stages: &mut [FundStage]) {
        let all: BTreeMap<FundId, ReturnSeries> = stages
            .iter()
            .filter(|s| s.report.is_computable())
            .map(|s| (s.report.fund.clone(), s.returns.clone()))
            .collect();

        let compute = |stage: &mut FundStage| {
            if !stage.report.is_computable() {
                return;
            }
            stage.report.capture = peer_average(&all, &stage.report.fund)
                .map(|peers| CaptureRatioCalculator::compute(&stage.returns, &peers, BenchmarkSource::PeerAverage));
        };
        if self.parallel {
            stages.par_iter_mut().for_each(compute);
        } else {
            stages.iter_mut().for_each(compute);
        }
    }

    fn return_correlation(&self, stages: &[FundStage]) -> CorrelationMatrix {
        let inputs: Vec<CorrelationInput<'_>> = stages
            .iter()
            .map(|s| CorrelationInput {
                fund: &s.report.fund,
                dates: s.returns.dates(),
                values: s.returns.values(),
            })
            .collect();
        CorrelationEngine::new(self.config.correlation.min_overlap).matrix(&inputs)
    }

    fn flow_correlation(&self, stages: &[FundStage]) -> Option<CorrelationMatrix> {
        let series: Vec<(&FundId, Vec<_>, Vec<f64>)> = stages
            .iter()
            .filter_map(|s| {
                let flows = s.report.flows.as_ref().filter(|f| !f.net_by_date.is_empty())?;
                let dates = flows.net_by_date.iter().map(|f| f.date).collect();
                let values = flows.net_by_date.iter().map(|f| f.net).collect();
                Some((&s.report.fund, dates, values))
            })
            .collect();
        if series.is_empty() {
            return None;
        }
        let inputs: Vec<CorrelationInput<'_>> = series
            .iter()
            .map(|(fund, dates, values)| CorrelationInput {
                fund: *fund,
                dates: dates.as_slice(),
                values: values.as_slice(),
            })
            .collect();
        Some(CorrelationEngine::new(self.config.correlation.min_overlap).matrix(&inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use navrisk_core::domain::{FlowKind, FlowRecord};

    fn raw(values: &[f64]) -> Vec<RawObservation> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| RawObservation::new(start + Duration::days(i as i64), *v))
            .collect()
    }

    fn wave(n: usize, amp: f64, phase: usize) -> Vec<f64> {
        let mut v = 100.0;
        (0..n)
            .map(|i| {
                let r = amp * (((i + phase) * 7 % 11) as f64 - 5.0) / 5.0;
                v *= 1.0 + r;
                v
            })
            .collect()
    }

    fn small_config() -> AnalyticsConfig {
        let mut cfg = AnalyticsConfig::default();
        cfg.loss.simulations = 200;
        cfg
    }

    #[test]
    fn single_fund_sections_present() {
        let pipeline = AnalysisPipeline::new(small_config());
        let input = FundInput::new(FundId::from("A"), raw(&wave(120, 0.01, 0)));
        let report = pipeline.analyze_fund(&input, None);
        assert!(report.is_computable());
        assert_eq!(report.observations, 120);
        assert!(report.metrics.is_ok());
        assert!(report.drawdown.is_ok());
        assert!(report.regime.is_ok());
        assert_eq!(report.capture, Err(Fault::NotComputable));
        assert!(report.flows.is_none());
    }

    #[test]
    fn short_fund_does_not_abort_universe() {
        let pipeline = AnalysisPipeline::new(small_config()).with_parallelism(false);
        let input = UniverseInput {
            funds: vec![
                FundInput::new(FundId::from("A"), raw(&wave(80, 0.01, 0))),
                FundInput::new(FundId::from("B"), raw(&[100.0])),
                FundInput::new(FundId::from("C"), raw(&wave(80, 0.02, 3))),
            ],
            benchmark: None,
        };
        let report = pipeline.analyze_universe(&input);
        assert_eq!(report.funds.len(), 3);
        let b = report.fund(&FundId::from("B")).unwrap();
        assert_eq!(b.fault, Some(Fault::NotComputable));
        let a = report.fund(&FundId::from("A")).unwrap();
        assert!(a.is_computable());
        assert_eq!(a.capture.as_ref().unwrap().source, BenchmarkSource::PeerAverage);
        assert_eq!(report.fingerprints.len(), 3);
        assert_eq!(report.manifest.fund_count, 3);
        assert!(report.flow_correlation.is_none());
        assert_eq!(report.flow_concentration, Err(Fault::NotComputable));
    }

    #[test]
    fn window_does_not_restrict_regimes() {
        let mut cfg = small_config();
        cfg.series.start = NaiveDate::from_ymd_opt(2023, 3, 1);
        let pipeline = AnalysisPipeline::new(cfg);
        let input = FundInput::new(FundId::from("A"), raw(&wave(150, 0.01, 0)));
        let report = pipeline.analyze_fund(&input, None);
        assert!(report.observations < 150);
        let regime = report.regime.unwrap();
        // full history: 149 returns, window 30
        assert_eq!(regime.timeline.len(), 149 - 30 + 1);
    }

    #[test]
    fn window_restricts_flows() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut cfg = small_config();
        cfg.series.start = Some(start + Duration::days(150));
        let flows = FlowSeries::new(
            (0..300)
                .step_by(5)
                .map(|i| FlowRecord {
                    date: start + Duration::days(i),
                    fund: FundId::from("A"),
                    kind: FlowKind::Subscription,
                    amount: 100.0,
                    segment: "Retail".into(),
                })
                .collect(),
        );
        let input = FundInput {
            flows: Some(flows),
            ..FundInput::new(FundId::from("A"), raw(&wave(300, 0.01, 0)))
        };
        let report = AnalysisPipeline::new(cfg).analyze_fund(&input, None);
        assert_eq!(report.observations, 150);
        let flows = report.flows.unwrap();
        assert_eq!(flows.record_count, 30);
        assert_eq!(flows.subscriptions, 3_000.0);
        assert!(flows.net_by_date.iter().all(|f| f.date >= start + Duration::days(150)));
    }

    #[test]
    fn dataset_hash_ignores_fund_order() {
        let a = FundInput::new(FundId::from("A"), raw(&[100.0, 101.0]));
        let b = FundInput::new(FundId::from("B"), raw(&[100.0, 99.0]));
        let one = UniverseInput {
            funds: vec![a.clone(), b.clone()],
            benchmark: None,
        };
        let two = UniverseInput {
            funds: vec![b, a],
            benchmark: None,
        };
        assert_eq!(one.dataset_hash(), two.dataset_hash());
    }
}
