//! NavRisk Analytics: risk and performance engine over fund valuation series.
//!
//! This crate builds on `navrisk-core` to provide:
//! - Dispersion, tail and risk-adjusted return metrics
//! - Drawdown episodes, ulcer index and pain ratio
//! - Volatility regimes with transition dynamics
//! - Capture ratios, loss probabilities, rolling indicators, period returns
//! - Flow analysis, universe correlation and the normalized risk fingerprint
//! - A two-phase pipeline (per fund, then cross-fund) with a run manifest

pub mod capture;
pub mod config;
pub mod correlation;
pub mod drawdown;
pub mod flows;
pub mod kmeans;
pub mod loss_probability;
pub mod metrics;
pub mod performance;
pub mod pipeline;
pub mod regime;
pub mod report;
pub mod risk_profile;
pub mod rolling;
pub mod tail_metrics;

pub use capture::{BenchmarkSource, CaptureRatioCalculator, CaptureRatios};
pub use config::{AnalyticsConfig, ConfigError, HorizonScaling, NormalizationMethod};
pub use correlation::{CorrelationEngine, CorrelationInput, CorrelationMatrix};
pub use drawdown::{DrawdownAnalysis, DrawdownAnalyzer, DrawdownEpisode};
pub use flows::{FlowAnalysis, FlowAnalyzer, FlowConcentration, FlowStability, NetAssetAnalysis};
pub use loss_probability::{HorizonLoss, LossMethod, LossProbabilities, LossProbabilityEstimator};
pub use metrics::RiskMetrics;
pub use performance::{CalendarPeriod, PerformanceCalculator, PerformanceReport, TrailingPeriod};
pub use pipeline::{AnalysisPipeline, FundInput, UniverseInput};
pub use regime::{RegimeAnalysis, RegimeLabel, TransitionMatrix, VolatilityRegimeClassifier};
pub use report::{FundReport, RunManifest, UniverseReport, SCHEMA_VERSION};
pub use risk_profile::{
    FundUniverse, RawRiskProfile, RiskDimension, RiskFingerprint, RiskFingerprintNormalizer,
};
pub use rolling::RollingRiskIndicators;
pub use tail_metrics::TailMetrics;
