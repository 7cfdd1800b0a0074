//! Derived summaries: overfitting gap, multiplicative effects, probability bands.

use crate::artifact::domain::Model;
use crate::inference::domain::Link;
use crate::inference::summary;

use super::domain::{Effect, MetricsCard, OverfitReport, ProbabilityBand};

/// Default overfitting tolerance, in percent of the training error.
pub const OVERFIT_THRESHOLD_PCT: f64 = 5.0;

/// `|train - test| / train * 100`; zero training error yields `None`.
pub fn gap_pct(train: f64, test: f64) -> Option<f64> {
    (train != 0.0).then(|| (train - test).abs() / train.abs() * 100.0)
}

pub fn overfit_report(card: &MetricsCard) -> Option<OverfitReport> {
    Some(OverfitReport {
        rmse_pct: gap_pct(card.train.rmse, card.test.rmse)?,
        mae_pct: gap_pct(card.train.mae, card.test.mae)?,
    })
}

impl MetricsCard {
    /// True when either gap exceeds `threshold_pct`, or the gap is undefined.
    pub fn is_overfit(&self, threshold_pct: f64) -> bool {
        match overfit_report(self) {
            Some(report) => report.rmse_pct > threshold_pct || report.mae_pct > threshold_pct,
            None => true,
        }
    }
}

/// Band thresholds: 0.7 and above is high, 0.4 and above moderate.
pub fn probability_band(p: f64) -> ProbabilityBand {
    if p >= 0.7 {
        ProbabilityBand::High
    } else if p >= 0.4 {
        ProbabilityBand::Moderate
    } else {
        ProbabilityBand::Low
    }
}

/// `exp(beta)` per slope for log-link models; empty for other links.
///
/// Uses the mean slope when the model carries draws.
pub fn effects(model: &Model) -> Vec<Effect> {
    let spec = model.spec();
    if spec.link != Link::Exp {
        return Vec::new();
    }
    spec.terms
        .iter()
        .zip(model.coefficients().slopes())
        .map(|(term, column)| Effect {
            feature: term.feature,
            multiplier: summary::mean(column).exp(),
        })
        .collect()
}
