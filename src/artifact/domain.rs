//! Domain types for model artifacts: the on-disk schema, the per-family
//! configuration record and the validated, immutable in-memory model.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::error::{ServeError, ServeResult};
use crate::evaluation::domain::MetricsCard;
use crate::features::domain::ScalingTransform;
use crate::inference::domain::Link;

/// Supported model families.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Revenue from price, identity link.
    Linear,
    /// Best-seller probability, sigmoid link over full posterior draws.
    Logistic,
    /// Per-category revenue on the log scale.
    Hierarchical,
    /// Quantity sold, Poisson with log link.
    Poisson,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Linear,
        ModelFamily::Logistic,
        ModelFamily::Hierarchical,
        ModelFamily::Poisson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Linear => "linear",
            ModelFamily::Logistic => "logistic",
            ModelFamily::Hierarchical => "hierarchical",
            ModelFamily::Poisson => "poisson",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ModelFamily::Linear => 0,
            ModelFamily::Logistic => 1,
            ModelFamily::Hierarchical => 2,
            ModelFamily::Poisson => 3,
        }
    }

    /// Configuration record driving loading and evaluation for this family.
    pub fn spec(&self) -> &'static ModelSpec {
        match self {
            ModelFamily::Linear => &LINEAR,
            ModelFamily::Logistic => &LOGISTIC,
            ModelFamily::Hierarchical => &HIERARCHICAL,
            ModelFamily::Poisson => &POISSON,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coefficient name as stored by the trainer, plus accepted alternative spellings.
#[derive(Copy, Clone, Debug)]
pub struct CoefName {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl CoefName {
    const fn plain(name: &'static str) -> Self {
        Self { name, aliases: &[] }
    }

    /// First stored key matching the canonical name or one of its aliases.
    pub fn resolve<'a, V>(&self, map: &'a BTreeMap<String, V>) -> Option<&'a V> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|key| map.get(key))
    }
}

/// How an input feature enters the linear predictor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// Standardized with the artifact's scaling transform.
    Standardized,
    /// Used as supplied (indicators, or values the caller already standardized).
    AsIs,
}

/// One slope term `coefficient * feature`.
#[derive(Copy, Clone, Debug)]
pub struct Term {
    pub coefficient: CoefName,
    pub feature: &'static str,
    pub encoding: Encoding,
}

/// Where the intercept of the linear predictor comes from.
#[derive(Copy, Clone, Debug)]
pub enum Intercept {
    Coefficient(CoefName),
    /// Looked up per category in the registry.
    Category,
}

/// Per-family configuration record.
#[derive(Debug)]
pub struct ModelSpec {
    pub family: ModelFamily,
    pub link: Link,
    pub intercept: Intercept,
    pub terms: &'static [Term],
    /// Family reports a credible interval and therefore needs full draws.
    pub needs_draws: bool,
    /// Output is clamped to the configured quantity range.
    pub clamped: bool,
}

impl ModelSpec {
    pub fn is_category_indexed(&self) -> bool {
        matches!(self.intercept, Intercept::Category)
    }

    /// Features that must have a scaling entry.
    pub fn standardized_features(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.terms
            .iter()
            .filter(|t| t.encoding == Encoding::Standardized)
            .map(|t| t.feature)
    }
}

pub static LINEAR: ModelSpec = ModelSpec {
    family: ModelFamily::Linear,
    link: Link::Identity,
    intercept: Intercept::Coefficient(CoefName::plain("alpha")),
    terms: &[Term {
        coefficient: CoefName::plain("beta"),
        feature: "price",
        encoding: Encoding::Standardized,
    }],
    needs_draws: false,
    clamped: false,
};

pub static LOGISTIC: ModelSpec = ModelSpec {
    family: ModelFamily::Logistic,
    link: Link::Logistic,
    intercept: Intercept::Coefficient(CoefName::plain("beta_0")),
    terms: &[
        Term {
            coefficient: CoefName::plain("beta_rating"),
            feature: "rating",
            encoding: Encoding::Standardized,
        },
        Term {
            coefficient: CoefName::plain("beta_price"),
            feature: "discounted_price",
            encoding: Encoding::Standardized,
        },
    ],
    needs_draws: true,
    clamped: false,
};

pub static HIERARCHICAL: ModelSpec = ModelSpec {
    family: ModelFamily::Hierarchical,
    link: Link::Exp,
    intercept: Intercept::Category,
    terms: &[
        Term {
            coefficient: CoefName::plain("b_p"),
            feature: "price_scaled",
            encoding: Encoding::AsIs,
        },
        Term {
            coefficient: CoefName::plain("b_r"),
            feature: "rating_scaled",
            encoding: Encoding::AsIs,
        },
    ],
    needs_draws: false,
    clamped: false,
};

// Bambi exports name the slopes after their predictors.
pub static POISSON: ModelSpec = ModelSpec {
    family: ModelFamily::Poisson,
    link: Link::Exp,
    intercept: Intercept::Coefficient(CoefName {
        name: "intercept",
        aliases: &["Intercept"],
    }),
    terms: &[
        Term {
            coefficient: CoefName {
                name: "beta_discount",
                aliases: &["discount_percent"],
            },
            feature: "discount_percent",
            encoding: Encoding::Standardized,
        },
        Term {
            coefficient: CoefName {
                name: "beta_rating",
                aliases: &["rating"],
            },
            feature: "rating",
            encoding: Encoding::Standardized,
        },
        Term {
            coefficient: CoefName {
                name: "beta_weekend",
                aliases: &["is_weekend"],
            },
            feature: "is_weekend",
            encoding: Encoding::AsIs,
        },
    ],
    needs_draws: false,
    clamped: true,
};

// ---------------------------------------------------------------------------
// On-disk schema
// ---------------------------------------------------------------------------

/// Artifact file as written by the offline trainer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub model: ModelFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub transform: ScalingTransform,
    pub posterior: PosteriorFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, ScalarOrDraws>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsCard>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PosteriorFile {
    Draws {
        coefficients: BTreeMap<String, Vec<f64>>,
    },
    Means {
        coefficients: BTreeMap<String, f64>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrDraws {
    Scalar(f64),
    Draws(Vec<f64>),
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PosteriorKind {
    /// Joint posterior draws, aligned across coefficients.
    Draws,
    /// One reduced mean per coefficient.
    Means,
}

/// Coefficients laid out in `ModelSpec` order.
///
/// Every column has length `n_draws`; index `i` across columns is one joint
/// draw. Point estimates are stored as single-row columns. The layout is
/// checked on construction and cannot change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct CoefficientTable {
    kind: PosteriorKind,
    n_draws: usize,
    intercept: Option<Vec<f64>>,
    slopes: Vec<Vec<f64>>,
}

impl CoefficientTable {
    /// Build a table shaped for `spec`: an intercept column unless the family
    /// is category-indexed, one slope column per term, equal non-empty
    /// columns, finite values, and a single row for `Means`.
    pub(crate) fn new(
        spec: &ModelSpec,
        kind: PosteriorKind,
        intercept: Option<Vec<f64>>,
        slopes: Vec<Vec<f64>>,
    ) -> ServeResult<Self> {
        let name = spec.family.as_str();
        if intercept.is_some() == spec.is_category_indexed() {
            return Err(ServeError::artifact(
                name,
                "intercept column does not match the model layout",
            ));
        }
        if slopes.len() != spec.terms.len() {
            return Err(ServeError::artifact(
                name,
                format!("expected {} slope columns, got {}", spec.terms.len(), slopes.len()),
            ));
        }

        let n_draws = intercept.as_ref().or(slopes.first()).map_or(0, Vec::len);
        if n_draws == 0 {
            return Err(ServeError::artifact(name, "posterior has no draws"));
        }
        if kind == PosteriorKind::Means && n_draws != 1 {
            return Err(ServeError::artifact(
                name,
                format!("means carry one value per coefficient, got {n_draws}"),
            ));
        }
        for column in intercept.iter().chain(&slopes) {
            if column.len() != n_draws {
                return Err(ServeError::artifact(
                    name,
                    format!("misaligned draws: {} vs {n_draws}", column.len()),
                ));
            }
            if column.iter().any(|v| !v.is_finite()) {
                let reason = match kind {
                    PosteriorKind::Draws => "non-finite posterior draw",
                    PosteriorKind::Means => "non-finite posterior mean",
                };
                return Err(ServeError::artifact(name, reason));
            }
        }

        Ok(Self {
            kind,
            n_draws,
            intercept,
            slopes,
        })
    }

    fn fits(&self, spec: &ModelSpec) -> bool {
        self.intercept.is_some() != spec.is_category_indexed() && self.slopes.len() == spec.terms.len()
    }

    pub fn kind(&self) -> PosteriorKind {
        self.kind
    }

    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    /// `None` for category-indexed families.
    pub fn intercept(&self) -> Option<&[f64]> {
        self.intercept.as_deref()
    }

    /// One column per `ModelSpec::terms` entry.
    pub fn slopes(&self) -> &[Vec<f64>] {
        &self.slopes
    }
}

/// Closed set of category labels with their intercept means.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryRegistry {
    intercepts: BTreeMap<String, f64>,
}

impl CategoryRegistry {
    pub fn new(intercepts: BTreeMap<String, f64>) -> Self {
        Self { intercepts }
    }

    pub fn intercept(&self, category: &str) -> ServeResult<f64> {
        self.intercepts
            .get(category)
            .copied()
            .ok_or_else(|| ServeError::unknown_category(category))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.intercepts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.intercepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intercepts.is_empty()
    }
}

/// Where a model's coefficients came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    Loaded { path: PathBuf, digest: String },
    Placeholder { reason: String },
    /// Built in memory by the caller (fixtures, embedded models).
    InMemory,
}

impl Provenance {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Provenance::Placeholder { .. })
    }
}

/// Validated, immutable model ready for evaluation.
///
/// Only built through `build_model` or `placeholder`, so every `Model` in the
/// process has passed the load checks.
#[derive(Clone, Debug)]
pub struct Model {
    spec: &'static ModelSpec,
    version: Option<String>,
    transform: ScalingTransform,
    coefficients: CoefficientTable,
    categories: Option<CategoryRegistry>,
    metrics: Option<MetricsCard>,
    provenance: Provenance,
}

/// Everything a `Model` is assembled from.
pub(crate) struct ModelParts {
    pub spec: &'static ModelSpec,
    pub version: Option<String>,
    pub transform: ScalingTransform,
    pub coefficients: CoefficientTable,
    pub categories: Option<CategoryRegistry>,
    pub metrics: Option<MetricsCard>,
    pub provenance: Provenance,
}

impl Model {
    pub(crate) fn new(parts: ModelParts) -> ServeResult<Self> {
        let name = parts.spec.family.as_str();
        if !parts.coefficients.fits(parts.spec) {
            return Err(ServeError::artifact(name, "coefficient table built for another layout"));
        }
        if parts.categories.is_some() != parts.spec.is_category_indexed() {
            return Err(ServeError::artifact(name, "category registry does not match the model layout"));
        }
        Ok(Self {
            spec: parts.spec,
            version: parts.version,
            transform: parts.transform,
            coefficients: parts.coefficients,
            categories: parts.categories,
            metrics: parts.metrics,
            provenance: parts.provenance,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.spec.family
    }

    pub fn spec(&self) -> &'static ModelSpec {
        self.spec
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn transform(&self) -> &ScalingTransform {
        &self.transform
    }

    pub fn coefficients(&self) -> &CoefficientTable {
        &self.coefficients
    }

    pub fn categories(&self) -> Option<&CategoryRegistry> {
        self.categories.as_ref()
    }

    pub fn metrics(&self) -> Option<&MetricsCard> {
        self.metrics.as_ref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_has_matching_spec() {
        for family in ModelFamily::ALL {
            assert_eq!(family.spec().family, family);
            assert_eq!(ModelFamily::ALL[family.index()], family);
        }
    }

    #[test]
    fn only_hierarchical_is_category_indexed() {
        let indexed: Vec<_> = ModelFamily::ALL
            .into_iter()
            .filter(|f| f.spec().is_category_indexed())
            .collect();
        assert_eq!(indexed, vec![ModelFamily::Hierarchical]);
    }

    #[test]
    fn poisson_weekend_is_not_standardized() {
        let features: Vec<_> = POISSON.standardized_features().collect();
        assert_eq!(features, vec!["discount_percent", "rating"]);
    }

    #[test]
    fn coef_name_prefers_canonical_then_alias() {
        let mut map = BTreeMap::new();
        map.insert("Intercept".to_string(), 1.0);
        let Intercept::Coefficient(name) = POISSON.intercept else {
            panic!("poisson intercept is a coefficient");
        };
        assert_eq!(name.resolve(&map), Some(&1.0));
        map.insert("intercept".to_string(), 2.0);
        assert_eq!(name.resolve(&map), Some(&2.0));
    }

    #[test]
    fn parses_tagged_posterior_and_mixed_categories() {
        let raw = r#"{
            "model": "hierarchical",
            "posterior": {"kind": "means", "coefficients": {"b_p": 0.5, "b_r": 0.1}},
            "categories": {"electronica": 1.0, "ropa": [1.9, 2.1]}
        }"#;
        let file: ArtifactFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.model, ModelFamily::Hierarchical);
        assert!(matches!(file.posterior, PosteriorFile::Means { .. }));
        let cats = file.categories.unwrap();
        assert!(matches!(cats["ropa"], ScalarOrDraws::Draws(ref d) if d.len() == 2));
    }

    #[test]
    fn table_rejects_draw_count_disagreeing_with_columns() {
        let err = CoefficientTable::new(
            &POISSON,
            PosteriorKind::Draws,
            Some(vec![0.8; 5]),
            vec![vec![0.12], vec![0.22], vec![0.08]],
        )
        .unwrap_err();
        assert!(matches!(err, ServeError::ArtifactFormat { ref reason, .. } if reason.contains("misaligned")));
    }

    #[test]
    fn table_rejects_wrong_column_layout() {
        let missing_slope =
            CoefficientTable::new(&POISSON, PosteriorKind::Means, Some(vec![0.8]), vec![vec![0.1]]);
        assert!(matches!(missing_slope, Err(ServeError::ArtifactFormat { .. })));

        let stray_intercept = CoefficientTable::new(
            &HIERARCHICAL,
            PosteriorKind::Means,
            Some(vec![1.0]),
            vec![vec![0.5], vec![0.1]],
        );
        assert!(matches!(stray_intercept, Err(ServeError::ArtifactFormat { .. })));

        let multi_row_means =
            CoefficientTable::new(&LINEAR, PosteriorKind::Means, Some(vec![1.0, 2.0]), vec![vec![0.5, 0.5]]);
        assert!(matches!(multi_row_means, Err(ServeError::ArtifactFormat { .. })));
    }

    #[test]
    fn model_rejects_table_from_another_family() {
        let table = CoefficientTable::new(&LINEAR, PosteriorKind::Means, Some(vec![10.0]), vec![vec![2.0]]).unwrap();
        let err = Model::new(ModelParts {
            spec: &POISSON,
            version: None,
            transform: ScalingTransform::new(),
            coefficients: table,
            categories: None,
            metrics: None,
            provenance: Provenance::InMemory,
        })
        .unwrap_err();
        assert!(matches!(err, ServeError::ArtifactFormat { .. }));
    }

    #[test]
    fn registry_rejects_unknown_label() {
        let registry = CategoryRegistry::new(BTreeMap::from([("ropa".to_string(), 2.0)]));
        assert_eq!(registry.intercept("ropa").unwrap(), 2.0);
        assert!(matches!(
            registry.intercept("juguetes"),
            Err(ServeError::UnknownCategory { .. })
        ));
    }
}
