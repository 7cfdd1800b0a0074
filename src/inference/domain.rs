//! Output types and link functions for posterior evaluation.

use serde::{Deserialize, Serialize};

use crate::common::config::{AppCfg, ClampCfg, IntervalCfg};

/// Maps the linear predictor to the output scale.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Link {
    Identity,
    /// Sigmoid, output in [0, 1].
    Logistic,
    /// Inverse of the log link.
    Exp,
}

impl Link {
    pub fn apply(&self, eta: f64) -> f64 {
        match self {
            Link::Identity => eta,
            Link::Logistic => 1.0 / (1.0 + (-eta).exp()),
            Link::Exp => eta.exp(),
        }
    }
}

/// Knobs that come from configuration rather than from the artifact.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EvalOptions {
    pub interval: IntervalCfg,
    pub clamp: ClampCfg,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            interval: IntervalCfg::default(),
            clamp: ClampCfg::default(),
        }
    }
}

impl From<&AppCfg> for EvalOptions {
    fn from(cfg: &AppCfg) -> Self {
        Self {
            interval: cfg.interval,
            clamp: cfg.quantity_clamp,
        }
    }
}

/// Quantile range of the output's posterior sample distribution.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    pub low: f64,
    pub high: f64,
}

/// Generic evaluation result shared by every family.
#[derive(Clone, Debug, PartialEq)]
pub struct Estimate {
    /// Mean of the linear predictor across draws.
    pub linear_predictor: f64,
    /// Mean of the link-transformed output across draws, after clamping.
    pub value: f64,
    /// Present only when the model carries full draws.
    pub interval: Option<CredibleInterval>,
    pub draws: usize,
}

/// Best-seller probability with its credible interval.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestSellerEstimate {
    pub p_mean: f64,
    pub p_low: f64,
    pub p_high: f64,
}

/// Category revenue on both the log and the natural scale.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryRevenue {
    pub log_revenue: f64,
    pub revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links() {
        assert_eq!(Link::Identity.apply(3.5), 3.5);
        assert_eq!(Link::Logistic.apply(0.0), 0.5);
        assert_eq!(Link::Exp.apply(0.0), 1.0);
    }

    #[test]
    fn sigmoid_saturates_without_nan() {
        assert_eq!(Link::Logistic.apply(1e6), 1.0);
        assert_eq!(Link::Logistic.apply(-1e6), 0.0);
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = AppCfg::default();
        cfg.quantity_clamp.max = 20.0;
        let opts = EvalOptions::from(&cfg);
        assert_eq!(opts.clamp.max, 20.0);
        assert_eq!(opts.interval, IntervalCfg::default());
    }
}
