//! Serialized output: per-fund reports, the cross-fund report and the run manifest.

use navrisk_core::domain::{ConfigHash, DatasetHash, Fault, FundId};
use navrisk_core::prepare::DataIssue;
use serde::{Deserialize, Serialize};

use crate::capture::CaptureRatios;
use crate::correlation::CorrelationMatrix;
use crate::drawdown::DrawdownAnalysis;
use crate::flows::{FlowAnalysis, FlowConcentration};
use crate::loss_probability::LossProbabilities;
use crate::metrics::RiskMetrics;
use crate::performance::PerformanceReport;
use crate::regime::RegimeAnalysis;
use crate::risk_profile::{RawRiskProfile, RiskFingerprint};
use crate::rolling::RollingRiskIndicators;

/// Current schema version of serialized reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything computed for one fund. A section that could not be produced
/// carries its fault instead; other sections are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundReport {
    pub fund: FundId,
    /// Clean valuations inside the analysis window.
    pub observations: usize,
    pub data_issues: Vec<DataIssue>,
    /// Set when the fund as a whole is not computable.
    pub fault: Option<Fault>,
    pub metrics: Result<RiskMetrics, Fault>,
    pub drawdown: Result<DrawdownAnalysis, Fault>,
    pub performance: Result<PerformanceReport, Fault>,
    pub rolling: Result<RollingRiskIndicators, Fault>,
    /// Always computed over the full history.
    pub regime: Result<RegimeAnalysis, Fault>,
    pub capture: Result<CaptureRatios, Fault>,
    pub loss: Result<LossProbabilities, Fault>,
    pub flows: Option<FlowAnalysis>,
    pub risk_profile: RawRiskProfile,
}

impl FundReport {
    /// Report for a fund with nothing computable.
    pub fn not_computable(fund: FundId, observations: usize, data_issues: Vec<DataIssue>, fault: Fault) -> Self {
        Self {
            risk_profile: RawRiskProfile::empty(fund.clone()),
            fund,
            observations,
            data_issues,
            fault: Some(fault),
            metrics: Err(fault),
            drawdown: Err(fault),
            performance: Err(fault),
            rolling: Err(fault),
            regime: Err(fault),
            capture: Err(fault),
            loss: Err(fault),
            flows: None,
        }
    }

    pub fn is_computable(&self) -> bool {
        self.fault.is_none()
    }
}

/// Identity of a universe run: same manifest, same report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub seed: u64,
    pub fund_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseReport {
    pub manifest: RunManifest,
    /// Ordered by fund id.
    pub funds: Vec<FundReport>,
    pub correlation: CorrelationMatrix,
    /// Net-flow correlation over funds that supplied flows.
    pub flow_correlation: Option<CorrelationMatrix>,
    /// `NotComputable` when no fund supplied flows.
    pub flow_concentration: Result<FlowConcentration, Fault>,
    pub fingerprints: Vec<RiskFingerprint>,
}

impl UniverseReport {
    pub fn fund(&self, id: &FundId) -> Option<&FundReport> {
        self.funds.iter().find(|f| &f.fund == id)
    }

    pub fn fingerprint(&self, id: &FundId) -> Option<&RiskFingerprint> {
        self.fingerprints.iter().find(|f| f.fund() == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_computable_report_serializes_faults() {
        let r = FundReport::not_computable(FundId::from("F"), 1, Vec::new(), Fault::NotComputable);
        assert!(!r.is_computable());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["metrics"]["Err"], "not_computable");
        assert_eq!(json["fault"], "not_computable");
    }

    #[test]
    fn manifest_defaults_schema_version() {
        let json = r#"{"config_hash":"c","dataset_hash":"d","seed":7,"fund_count":2}"#;
        let m: RunManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.schema_version, SCHEMA_VERSION);
        assert_eq!(m.seed, 7);
    }
}
