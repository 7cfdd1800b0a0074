//! Scaling transform captured at training time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::error::{ServeError, ServeResult};

/// Per-feature affine standardization parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
}

impl FeatureStats {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// A transform entry is usable only with a finite mean and a finite, non-zero std.
    pub fn is_degenerate(&self) -> bool {
        !self.mean.is_finite() || !self.std.is_finite() || self.std == 0.0
    }
}

/// Mapping from feature name to the statistics fitted during training.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalingTransform {
    features: BTreeMap<String, FeatureStats>,
}

impl ScalingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by fixtures and placeholder artifacts.
    pub fn with(mut self, feature: impl Into<String>, mean: f64, std: f64) -> Self {
        self.features
            .insert(feature.into(), FeatureStats::new(mean, std));
        self
    }

    /// Look up a feature, rejecting missing or degenerate entries.
    pub fn stats(&self, feature: &str) -> ServeResult<FeatureStats> {
        let stats = self
            .features
            .get(feature)
            .copied()
            .ok_or_else(|| ServeError::missing_transform(feature))?;
        if stats.is_degenerate() {
            return Err(ServeError::degenerate(feature, stats.std));
        }
        Ok(stats)
    }

    /// Check that every listed feature has a usable entry.
    pub fn require<'a, I>(&self, features: I) -> ServeResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for feature in features {
            self.stats(feature)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_flat_map() {
        let transform: ScalingTransform =
            serde_json::from_str(r#"{"price": {"mean": 100.0, "std": 10.0}}"#).unwrap();
        assert_eq!(transform.stats("price").unwrap(), FeatureStats::new(100.0, 10.0));
        assert_eq!(transform.len(), 1);
    }

    #[test]
    fn zero_and_nan_std_are_degenerate() {
        let transform = ScalingTransform::new()
            .with("rating", 4.0, 0.0)
            .with("discount_percent", 15.0, f64::NAN);
        assert!(matches!(
            transform.stats("rating"),
            Err(ServeError::DegenerateTransform { .. })
        ));
        assert!(matches!(
            transform.require(["discount_percent"]),
            Err(ServeError::DegenerateTransform { .. })
        ));
    }

    #[test]
    fn missing_feature_is_reported_by_name() {
        let transform = ScalingTransform::new().with("rating", 4.0, 0.5);
        match transform.require(["rating", "price"]) {
            Err(ServeError::MissingTransform { feature }) => assert_eq!(feature, "price"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
