//! Probability and magnitude of loss over fixed horizons.
//!
//! Two estimates per horizon:
//! - bootstrap: iid resampling of historical one-period returns, compounded
//!   over the horizon. Assumes returns are independent and identically
//!   distributed; that is a modelling simplification, not a guarantee.
//! - empirical: every overlapping horizon-length window of the valuation path.
//!
//! Each (fund, horizon) pair draws from its own `StdRng` derived from the
//! master seed, so results do not depend on scheduling or batch composition.

use navrisk_core::domain::{DatedSeries, Fault, FundId, Metric, ReturnSeries, ValuationSeries};
use navrisk_core::rng::RngHierarchy;
use navrisk_core::stats::mean;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LossConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossMethod {
    Bootstrap,
    Empirical,
}

/// Loss statistics for one horizon. Losses and gains are magnitudes of the
/// compounded horizon return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonLoss {
    pub horizon: usize,
    pub method: LossMethod,
    pub samples: usize,
    /// Fraction of samples with a negative cumulative return.
    pub probability: Metric,
    /// Mean loss magnitude conditional on a loss.
    pub mean_loss: Metric,
    pub mean_gain: Metric,
    pub gain_loss_ratio: Metric,
    /// Derived seed used for this horizon (bootstrap only).
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossProbabilities {
    pub master_seed: u64,
    pub simulations: usize,
    pub bootstrap: Vec<HorizonLoss>,
    pub empirical: Vec<HorizonLoss>,
}

fn summarize(horizon: usize, method: LossMethod, outcomes: &[f64], seed: Option<u64>) -> HorizonLoss {
    if outcomes.is_empty() {
        let missing = Metric::missing(Fault::NotComputable);
        return HorizonLoss {
            horizon,
            method,
            samples: 0,
            probability: missing,
            mean_loss: missing,
            mean_gain: missing,
            gain_loss_ratio: missing,
            seed,
        };
    }
    let losses: Vec<f64> = outcomes.iter().filter(|r| **r < 0.0).map(|r| -r).collect();
    let gains: Vec<f64> = outcomes.iter().copied().filter(|r| *r > 0.0).collect();
    let probability = losses.len() as f64 / outcomes.len() as f64;

    let mean_loss = mean(&losses);
    let mean_gain = mean(&gains);
    let gain_loss_ratio = match (mean_gain, mean_loss) {
        (Some(g), Some(l)) if l > 0.0 => Metric::ok(g / l),
        _ => Metric::missing(Fault::Undefined),
    };

    HorizonLoss {
        horizon,
        method,
        samples: outcomes.len(),
        probability: Metric::ok(probability),
        mean_loss: mean_loss.map_or(Metric::missing(Fault::Undefined), Metric::ok),
        mean_gain: mean_gain.map_or(Metric::missing(Fault::Undefined), Metric::ok),
        gain_loss_ratio,
        seed,
    }
}

/// Compounded returns of `simulations` iid resamples of length `horizon`.
pub fn bootstrap_outcomes<R: Rng>(returns: &[f64], horizon: usize, simulations: usize, rng: &mut R) -> Vec<f64> {
    if returns.is_empty() || horizon == 0 {
        return Vec::new();
    }
    let n = returns.len();
    (0..simulations)
        .map(|_| {
            let growth: f64 = (0..horizon).map(|_| 1.0 + returns[rng.gen_range(0..n)]).product();
            growth - 1.0
        })
        .collect()
}

/// Returns of every overlapping `horizon`-period window of the valuation path.
pub fn empirical_outcomes(values: &[f64], horizon: usize) -> Vec<f64> {
    if horizon == 0 || values.len() <= horizon {
        return Vec::new();
    }
    (0..values.len() - horizon)
        .map(|i| values[i + horizon] / values[i] - 1.0)
        .collect()
}

pub struct LossProbabilityEstimator {
    config: LossConfig,
    rng: RngHierarchy,
}

impl LossProbabilityEstimator {
    pub fn new(config: LossConfig) -> Self {
        let rng = RngHierarchy::new(config.seed);
        Self { config, rng }
    }

    pub fn estimate(&self, fund: &FundId, returns: &ReturnSeries, valuations: &ValuationSeries) -> LossProbabilities {
        let bootstrap = self
            .config
            .horizons
            .iter()
            .map(|&h| {
                let seed = self.rng.sub_seed(fund, h as u64);
                let mut rng = self.rng.rng_for(fund, h as u64);
                let outcomes = bootstrap_outcomes(returns.values(), h, self.config.simulations, &mut rng);
                summarize(h, LossMethod::Bootstrap, &outcomes, Some(seed))
            })
            .collect();

        let empirical = self
            .config
            .horizons
            .iter()
            .map(|&h| summarize(h, LossMethod::Empirical, &empirical_outcomes(valuations.values(), h), None))
            .collect();

        LossProbabilities {
            master_seed: self.rng.master_seed(),
            simulations: self.config.simulations,
            bootstrap,
            empirical,
        }
    }
}
