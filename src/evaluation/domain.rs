//! Stored fit metrics and derived summaries shipped alongside an artifact.

use serde::{Deserialize, Serialize};

/// Error metrics on one data split.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub rmse: f64,
    pub mae: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
}

/// Train/test metrics recorded by the trainer.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsCard {
    pub train: FitMetrics,
    pub test: FitMetrics,
}

/// Relative train/test gap in percent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct OverfitReport {
    pub rmse_pct: f64,
    pub mae_pct: f64,
}

/// Coarse reading of a best-seller probability.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityBand {
    High,
    Moderate,
    Low,
}

/// Multiplicative change in the expected outcome per unit of a log-link term.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Effect {
    pub feature: &'static str,
    pub multiplier: f64,
}
