//! Fault taxonomy and the fault-carrying metric value.
//!
//! Faults are local: a fault on one metric never prevents computation of
//! another metric, and a fault on one fund never aborts a batch. Every
//! numeric output is a [`Metric`] so that a fault travels with the number it
//! replaces instead of collapsing into a silent zero.

use serde::{Deserialize, Serialize};

/// Why a metric is missing or should not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Bad or missing input point; the point was dropped and computation continued.
    #[error("data quality issue: input point dropped")]
    DataQuality,
    /// Too few observations for the requested metric.
    #[error("not computable: too few observations")]
    NotComputable,
    /// Mathematically undefined (zero denominator).
    #[error("undefined: zero denominator")]
    Undefined,
    /// Computed, but on too few samples to be trusted.
    #[error("low confidence: too few samples")]
    LowConfidence,
    /// Pairwise statistic lacking enough joint history.
    #[error("insufficient overlap between series")]
    InsufficientOverlap,
}

/// A numeric output that may carry a fault marker in place of (or alongside) its value.
///
/// Serialized with a `status` tag:
/// `{"status":"ok","value":0.12}`,
/// `{"status":"flagged","value":0.12,"fault":"low_confidence"}`,
/// `{"status":"missing","fault":"undefined"}`.
///
/// Non-finite values (infinite persistence) serialize as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Metric {
    Ok {
        #[serde(with = "finite_or_null")]
        value: f64,
    },
    Flagged {
        #[serde(with = "finite_or_null")]
        value: f64,
        fault: Fault,
    },
    Missing {
        fault: Fault,
    },
}

impl Metric {
    pub fn ok(value: f64) -> Self {
        Metric::Ok { value }
    }

    pub fn flagged(value: f64, fault: Fault) -> Self {
        Metric::Flagged { value, fault }
    }

    pub fn missing(fault: Fault) -> Self {
        Metric::Missing { fault }
    }

    /// A value that is returned but flagged `LowConfidence` when `sample_size`
    /// is below `threshold`.
    pub fn with_confidence(value: f64, sample_size: usize, threshold: usize) -> Self {
        if sample_size < threshold {
            Metric::flagged(value, Fault::LowConfidence)
        } else {
            Metric::ok(value)
        }
    }

    /// Wrap a fallible computation; `Err` becomes a missing metric.
    pub fn from_result(result: Result<f64, Fault>) -> Self {
        match result {
            Ok(v) => Metric::ok(v),
            Err(f) => Metric::missing(f),
        }
    }

    /// The numeric value, if one was produced (flagged values included).
    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Ok { value } | Metric::Flagged { value, .. } => Some(*value),
            Metric::Missing { .. } => None,
        }
    }

    /// The attached fault, if any.
    pub fn fault(&self) -> Option<Fault> {
        match self {
            Metric::Ok { .. } => None,
            Metric::Flagged { fault, .. } | Metric::Missing { fault } => Some(*fault),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Metric::Ok { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Metric::Missing { .. })
    }

    /// Apply `f` to the value, keeping the fault marker.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Metric::Ok { value } => Metric::Ok { value: f(value) },
            Metric::Flagged { value, fault } => Metric::Flagged {
                value: f(value),
                fault,
            },
            missing => missing,
        }
    }

    /// Keep the value but attach `fault` if the metric is currently clean.
    pub fn flag(self, fault: Fault) -> Self {
        match self {
            Metric::Ok { value } => Metric::Flagged { value, fault },
            other => other,
        }
    }
}

impl From<Result<f64, Fault>> for Metric {
    fn from(result: Result<f64, Fault>) -> Self {
        Metric::from_result(result)
    }
}

mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value: Option<f64> = Option::deserialize(deserializer)?;
        Ok(value.unwrap_or(f64::INFINITY))
    }
}
