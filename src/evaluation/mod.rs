//! Evaluation summaries stored with an artifact or derived from its coefficients.

pub mod domain;
pub mod service;

pub use domain::{Effect, FitMetrics, MetricsCard, OverfitReport, ProbabilityBand};
pub use service::{effects, overfit_report, probability_band, OVERFIT_THRESHOLD_PCT};
