//! Artifact validation and the process-wide init-once cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::common::config::AppCfg;
use crate::common::error::{ServeError, ServeResult};
use crate::features::domain::ScalingTransform;
use crate::inference::summary;

use super::domain::{
    ArtifactFile, CategoryRegistry, CoefficientTable, Intercept, Model, ModelFamily, ModelParts,
    ModelSpec, PosteriorFile, PosteriorKind, Provenance, ScalarOrDraws,
};
use super::repo_fs::{ArtifactRepo, FsArtifactRepo};

/// Validate a parsed artifact against its family's `ModelSpec` and build the model.
///
/// All shape checks happen here so evaluation never sees a malformed model.
pub fn build_model(
    family: ModelFamily,
    file: ArtifactFile,
    provenance: Provenance,
) -> ServeResult<Model> {
    let spec = family.spec();
    let name = family.as_str();
    if file.model != family {
        return Err(ServeError::artifact(
            name,
            format!("artifact declares model `{}`", file.model),
        ));
    }

    file.transform.require(spec.standardized_features())?;

    let coefficients = match file.posterior {
        PosteriorFile::Draws { coefficients } => draws_table(spec, &coefficients)?,
        PosteriorFile::Means { coefficients } => means_table(spec, &coefficients)?,
    };

    let categories = if spec.is_category_indexed() {
        let raw = file
            .categories
            .ok_or_else(|| ServeError::artifact(name, "missing category registry"))?;
        Some(category_registry(name, raw)?)
    } else {
        None
    };

    Model::new(ModelParts {
        spec,
        version: file.version,
        transform: file.transform,
        coefficients,
        categories,
        metrics: file.metrics,
        provenance,
    })
}

fn resolve_columns<'a, V>(
    spec: &ModelSpec,
    coefficients: &'a BTreeMap<String, V>,
) -> ServeResult<(Option<&'a V>, Vec<&'a V>)> {
    let name = spec.family.as_str();
    let missing = |coef: &str| ServeError::artifact(name, format!("missing coefficient `{coef}`"));

    let intercept = match spec.intercept {
        Intercept::Coefficient(coef) => {
            Some(coef.resolve(coefficients).ok_or_else(|| missing(coef.name))?)
        }
        Intercept::Category => None,
    };
    let slopes = spec
        .terms
        .iter()
        .map(|term| {
            term.coefficient
                .resolve(coefficients)
                .ok_or_else(|| missing(term.coefficient.name))
        })
        .collect::<ServeResult<Vec<_>>>()?;
    Ok((intercept, slopes))
}

fn draws_table(
    spec: &ModelSpec,
    coefficients: &BTreeMap<String, Vec<f64>>,
) -> ServeResult<CoefficientTable> {
    let (intercept, slopes) = resolve_columns(spec, coefficients)?;
    let table = CoefficientTable::new(
        spec,
        PosteriorKind::Draws,
        intercept.cloned(),
        slopes.into_iter().cloned().collect(),
    )?;
    if spec.needs_draws {
        return Ok(table);
    }

    // Means-only families reduce each column once at load. Finite draws can
    // still overflow to a non-finite mean, which the table rejects.
    CoefficientTable::new(
        spec,
        PosteriorKind::Means,
        table.intercept().map(|c| vec![summary::mean(c)]),
        table.slopes().iter().map(|c| vec![summary::mean(c)]).collect(),
    )
}

fn means_table(
    spec: &ModelSpec,
    coefficients: &BTreeMap<String, f64>,
) -> ServeResult<CoefficientTable> {
    if spec.needs_draws {
        return Err(ServeError::artifact(
            spec.family.as_str(),
            "credible intervals require posterior draws, got means",
        ));
    }
    let (intercept, slopes) = resolve_columns(spec, coefficients)?;
    CoefficientTable::new(
        spec,
        PosteriorKind::Means,
        intercept.map(|v| vec![*v]),
        slopes.into_iter().map(|v| vec![*v]).collect(),
    )
}

fn category_registry(
    name: &str,
    raw: BTreeMap<String, ScalarOrDraws>,
) -> ServeResult<CategoryRegistry> {
    if raw.is_empty() {
        return Err(ServeError::artifact(name, "empty category registry"));
    }
    let mut intercepts = BTreeMap::new();
    for (label, value) in raw {
        let mean = match value {
            ScalarOrDraws::Scalar(v) => v,
            ScalarOrDraws::Draws(draws) if draws.is_empty() => {
                return Err(ServeError::artifact(
                    name,
                    format!("category `{label}` has no draws"),
                ))
            }
            ScalarOrDraws::Draws(draws) => summary::mean(&draws),
        };
        if !mean.is_finite() {
            return Err(ServeError::artifact(
                name,
                format!("category `{label}` has a non-finite intercept"),
            ));
        }
        intercepts.insert(label, mean);
    }
    Ok(CategoryRegistry::new(intercepts))
}

/// Built-in quantity coefficients served only when explicitly allowed.
///
/// Returns `None` for families that have no placeholder.
pub fn placeholder(family: ModelFamily, reason: impl Into<String>) -> Option<Model> {
    if family != ModelFamily::Poisson {
        return None;
    }
    let spec = family.spec();
    let coefficients = CoefficientTable::new(
        spec,
        PosteriorKind::Means,
        Some(vec![0.8]),
        vec![vec![0.12], vec![0.22], vec![0.08]],
    )
    .ok()?;
    Model::new(ModelParts {
        spec,
        version: None,
        transform: ScalingTransform::new()
            .with("discount_percent", 15.0, 12.0)
            .with("rating", 4.0, 0.8),
        coefficients,
        categories: None,
        metrics: None,
        provenance: Provenance::Placeholder {
            reason: reason.into(),
        },
    })
    .ok()
}

/// Loads each family's artifact at most once and shares it read-only.
pub struct ArtifactCache<R = FsArtifactRepo> {
    repo: R,
    allow_placeholder: bool,
    slots: [OnceCell<Arc<Model>>; 4],
}

impl ArtifactCache<FsArtifactRepo> {
    pub fn from_config(cfg: &AppCfg) -> Self {
        Self::new(FsArtifactRepo::new(cfg), cfg.allow_placeholder)
    }
}

impl<R: ArtifactRepo> ArtifactCache<R> {
    pub fn new(repo: R, allow_placeholder: bool) -> Self {
        Self {
            repo,
            allow_placeholder,
            slots: Default::default(),
        }
    }

    /// Shared model for `family`, loading it on first use.
    ///
    /// A failed load leaves the slot empty so the error is reported again on
    /// the next call.
    pub fn get(&self, family: ModelFamily) -> ServeResult<Arc<Model>> {
        self.slots[family.index()]
            .get_or_try_init(|| self.load(family).map(Arc::new))
            .map(Arc::clone)
    }

    /// Install a model from `build_model` or `placeholder`. Returns `false` if
    /// the slot was taken.
    pub fn preload(&self, model: Model) -> bool {
        self.slots[model.family().index()]
            .set(Arc::new(model))
            .is_ok()
    }

    pub fn is_loaded(&self, family: ModelFamily) -> bool {
        self.slots[family.index()].get().is_some()
    }

    fn load(&self, family: ModelFamily) -> ServeResult<Model> {
        let started = Instant::now();
        let result = self
            .repo
            .get_artifact(family)
            .and_then(|(file, provenance)| build_model(family, file, provenance));

        match result {
            Ok(model) => {
                info!(
                    model = family.as_str(),
                    draws = model.coefficients().n_draws(),
                    provenance = ?model.provenance(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "artifact loaded"
                );
                Ok(model)
            }
            Err(err) if self.allow_placeholder => match placeholder(family, err.to_string()) {
                Some(model) => {
                    warn!(model = family.as_str(), error = %err, "serving placeholder coefficients");
                    Ok(model)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}
