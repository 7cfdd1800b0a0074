//! Apply a stored scaling transform to raw inputs.
//!
//! The statistics always come from training; nothing here refits them.

use crate::common::error::ServeResult;

use super::domain::ScalingTransform;

/// Standardize a single named value.
pub fn standardize_one(feature: &str, raw: f64, transform: &ScalingTransform) -> ServeResult<f64> {
    let stats = transform.stats(feature)?;
    Ok((raw - stats.mean) / stats.std)
}

/// Standardize an ordered list of named raw values, keeping the input order.
///
/// Fails before producing any output if a feature has no usable entry.
pub fn standardize(raw: &[(&str, f64)], transform: &ScalingTransform) -> ServeResult<Vec<f64>> {
    raw.iter()
        .map(|(feature, value)| standardize_one(feature, *value, transform))
        .collect()
}
