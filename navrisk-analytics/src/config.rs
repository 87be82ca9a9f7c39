//! Analysis configuration.
//!
//! Every field is optional in TOML; missing sections take the defaults below.
//!
//! ```toml
//! [risk]
//! confidence_level = 0.99
//! horizon_scaling = "compounded"
//!
//! [loss]
//! horizons = [21, 63]
//! seed = 7
//! ```

use chrono::NaiveDate;
use navrisk_core::domain::{ConfigHash, DateWindow};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration surface of an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub series: SeriesConfig,
    pub risk: RiskConfig,
    pub regime: RegimeConfig,
    pub loss: LossConfig,
    pub correlation: CorrelationConfig,
    pub fingerprint: FingerprintConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Clean valuations required before a fund is `NotComputable`.
    pub min_observations: usize,
    /// Inclusive analysis window. Regime classification ignores it.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
            start: None,
            end: None,
        }
    }
}

impl SeriesConfig {
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start, self.end)
    }
}

/// How VaR/CVaR are carried from one period to a longer horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonScaling {
    /// One-period quantile multiplied by `sqrt(horizon)`.
    #[default]
    SquareRootOfTime,
    /// Quantile of overlapping compounded `horizon`-period returns.
    Compounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub periods_per_year: f64,
    pub confidence_level: f64,
    /// Annual risk-free rate.
    pub risk_free_rate: f64,
    /// VaR/CVaR horizon in periods.
    pub var_horizon: usize,
    pub horizon_scaling: HorizonScaling,
    /// Sample size below which tail estimates are flagged `LowConfidence`.
    pub low_confidence_below: usize,
    /// Window of the rolling risk indicators.
    pub rolling_window: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            confidence_level: 0.95,
            risk_free_rate: 0.0,
            var_horizon: 1,
            horizon_scaling: HorizonScaling::SquareRootOfTime,
            low_confidence_below: 30,
            rolling_window: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Rolling volatility window.
    pub window: usize,
    pub max_iterations: usize,
    /// Convergence threshold on the largest centroid move.
    pub tolerance: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            window: 30,
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub horizons: Vec<usize>,
    pub simulations: usize,
    pub seed: u64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            horizons: vec![21, 63, 126],
            simulations: 10_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub min_overlap: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { min_overlap: 10 }
    }
}

/// Scaling applied to oriented fingerprint dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    #[default]
    MinMax,
    Rank,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub method: NormalizationMethod,
}

impl AnalyticsConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    pub fn config_hash(&self) -> ConfigHash {
        let json = serde_json::to_string(self).unwrap_or_default();
        ConfigHash(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.series.min_observations == 0 {
            return invalid("series.min_observations must be at least 1");
        }
        if let (Some(s), Some(e)) = (self.series.start, self.series.end) {
            if s > e {
                return invalid("series.start is after series.end");
            }
        }
        let r = &self.risk;
        if !(r.periods_per_year.is_finite() && r.periods_per_year > 0.0) {
            return invalid("risk.periods_per_year must be positive");
        }
        if !(r.confidence_level > 0.0 && r.confidence_level < 1.0) {
            return invalid("risk.confidence_level must be in (0, 1)");
        }
        if !r.risk_free_rate.is_finite() {
            return invalid("risk.risk_free_rate must be finite");
        }
        if r.var_horizon == 0 {
            return invalid("risk.var_horizon must be at least 1");
        }
        if r.rolling_window < 2 {
            return invalid("risk.rolling_window must be at least 2");
        }
        if self.regime.window < 2 {
            return invalid("regime.window must be at least 2");
        }
        if self.regime.max_iterations == 0 {
            return invalid("regime.max_iterations must be at least 1");
        }
        if !(self.regime.tolerance.is_finite() && self.regime.tolerance >= 0.0) {
            return invalid("regime.tolerance must be non-negative");
        }
        if self.loss.horizons.is_empty() || self.loss.horizons.contains(&0) {
            return invalid("loss.horizons must be non-empty and positive");
        }
        if self.loss.simulations == 0 {
            return invalid("loss.simulations must be at least 1");
        }
        if self.correlation.min_overlap < 2 {
            return invalid("correlation.min_overlap must be at least 2");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalyticsConfig::default();
        assert_eq!(c.series.min_observations, 2);
        assert_eq!(c.risk.periods_per_year, 252.0);
        assert_eq!(c.risk.confidence_level, 0.95);
        assert_eq!(c.risk.rolling_window, 60);
        assert_eq!(c.regime.window, 30);
        assert_eq!(c.loss.simulations, 10_000);
        assert_eq!(c.loss.horizons, vec![21, 63, 126]);
        assert_eq!(c.correlation.min_overlap, 10);
        assert_eq!(c.risk.horizon_scaling, HorizonScaling::SquareRootOfTime);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let c = AnalyticsConfig::from_toml("").unwrap();
        assert_eq!(c, AnalyticsConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let c = AnalyticsConfig::from_toml(
            r#"
[risk]
confidence_level = 0.99
horizon_scaling = "compounded"

[loss]
horizons = [5]
seed = 7

[series]
start = "2023-01-01"
"#,
        )
        .unwrap();
        assert_eq!(c.risk.confidence_level, 0.99);
        assert_eq!(c.risk.horizon_scaling, HorizonScaling::Compounded);
        assert_eq!(c.risk.periods_per_year, 252.0);
        assert_eq!(c.loss.horizons, vec![5]);
        assert_eq!(c.loss.seed, 7);
        assert_eq!(c.loss.simulations, 10_000);
        assert_eq!(c.series.start, NaiveDate::from_ymd_opt(2023, 1, 1));
    }

    #[test]
    fn toml_roundtrip() {
        let mut c = AnalyticsConfig::default();
        c.fingerprint.method = NormalizationMethod::Rank;
        let text = c.to_toml().unwrap();
        assert_eq!(AnalyticsConfig::from_toml(&text).unwrap(), c);
    }

    #[test]
    fn rejects_bad_confidence() {
        let err = AnalyticsConfig::from_toml("[risk]\nconfidence_level = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_inverted_window() {
        let err = AnalyticsConfig::from_toml("[series]\nstart = \"2024-01-01\"\nend = \"2023-01-01\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_horizon() {
        assert!(AnalyticsConfig::from_toml("[loss]\nhorizons = [0]").is_err());
    }

    #[test]
    fn config_hash_is_deterministic_and_sensitive() {
        let a = AnalyticsConfig::default();
        let mut b = AnalyticsConfig::default();
        assert_eq!(a.config_hash(), b.config_hash());
        b.loss.seed = 43;
        assert_ne!(a.config_hash(), b.config_hash());
    }
}
