//! Posterior evaluation.
//!
//! One evaluator serves every family: the `ModelSpec` attached to a model
//! says which coefficients form the linear predictor, how each input is
//! encoded and which link applies. Draws are combined per joint draw before
//! any summary is taken, so the interval is a quantile of the output, never of
//! individual coefficients.

use tracing::debug;

use crate::artifact::domain::{Encoding, Model, ModelFamily, PosteriorKind};
use crate::common::error::{ServeError, ServeResult};
use crate::features::service::standardize;

use super::domain::{BestSellerEstimate, CategoryRevenue, CredibleInterval, Estimate, EvalOptions};
use super::summary;

/// Raw inputs for one evaluation, named after the `ModelSpec` term features.
#[derive(Clone, Debug, Default)]
pub struct Inputs<'a> {
    pub values: Vec<(&'a str, f64)>,
    pub category: Option<&'a str>,
}

impl<'a> Inputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, feature: &'a str, raw: f64) -> Self {
        self.values.push((feature, raw));
        self
    }

    pub fn category(mut self, category: &'a str) -> Self {
        self.category = Some(category);
        self
    }

    fn get(&self, feature: &str) -> ServeResult<f64> {
        let raw = self
            .values
            .iter()
            .find(|(name, _)| *name == feature)
            .map(|(_, v)| *v)
            .ok_or_else(|| ServeError::invalid_input(feature, "missing"))?;
        if !raw.is_finite() {
            return Err(ServeError::invalid_input(feature, "not a finite number"));
        }
        Ok(raw)
    }
}

/// Feature vector in `ModelSpec::terms` order, standardized where the term says so.
fn design_row(model: &Model, inputs: &Inputs<'_>) -> ServeResult<Vec<f64>> {
    let terms = model.spec().terms;
    let mut row = Vec::with_capacity(terms.len());
    for term in terms {
        row.push(inputs.get(term.feature)?);
    }

    let to_scale: Vec<(&str, f64)> = terms
        .iter()
        .zip(&row)
        .filter(|(term, _)| term.encoding == Encoding::Standardized)
        .map(|(term, raw)| (term.feature, *raw))
        .collect();
    let mut scaled = standardize(&to_scale, model.transform())?.into_iter();

    for (term, slot) in terms.iter().zip(row.iter_mut()) {
        if term.encoding == Encoding::Standardized {
            if let Some(z) = scaled.next() {
                *slot = z;
            }
        }
    }
    Ok(row)
}

/// Evaluate any model on raw inputs.
pub fn evaluate(model: &Model, inputs: &Inputs<'_>, opts: &EvalOptions) -> ServeResult<Estimate> {
    let spec = model.spec();
    let x = design_row(model, inputs)?;

    let category_intercept = match (model.categories(), spec.is_category_indexed()) {
        (Some(registry), true) => {
            let category = inputs
                .category
                .ok_or_else(|| ServeError::invalid_input("category", "missing"))?;
            Some(registry.intercept(category)?)
        }
        (None, true) => {
            return Err(ServeError::artifact(
                spec.family.as_str(),
                "missing category registry",
            ))
        }
        (_, false) => None,
    };

    // Column lengths equal `n_draws` and slope columns match `spec.terms`,
    // both enforced when the table was built.
    let table = model.coefficients();
    let n = table.n_draws();
    let mut eta = Vec::with_capacity(n);
    for i in 0..n {
        let base = match (table.intercept(), category_intercept) {
            (Some(column), _) => column[i],
            (None, Some(a)) => a,
            (None, None) => 0.0,
        };
        let slopes: f64 = table
            .slopes()
            .iter()
            .zip(&x)
            .map(|(column, xj)| column[i] * xj)
            .sum();
        eta.push(base + slopes);
    }

    let linear_predictor = summary::mean(&eta);
    let mut output: Vec<f64> = eta.iter().map(|e| spec.link.apply(*e)).collect();

    let (mut value, mut interval) = match table.kind() {
        PosteriorKind::Draws => {
            let (m, low, high) =
                summary::mean_and_interval(&mut output, opts.interval.low, opts.interval.high);
            (m, Some(CredibleInterval { low, high }))
        }
        PosteriorKind::Means => (summary::mean(&output), None),
    };

    if spec.clamped {
        value = clamp(value, opts.clamp.min, opts.clamp.max);
        interval = interval.map(|ci| CredibleInterval {
            low: clamp(ci.low, opts.clamp.min, opts.clamp.max),
            high: clamp(ci.high, opts.clamp.min, opts.clamp.max),
        });
    }

    debug!(
        model = spec.family.as_str(),
        draws = n,
        linear_predictor,
        value,
        "posterior evaluated"
    );

    Ok(Estimate {
        linear_predictor,
        value,
        interval,
        draws: n,
    })
}

/// NaN collapses to `min`, so the result is always inside the range.
fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

fn expect_family(model: &Model, family: ModelFamily) -> ServeResult<()> {
    if model.family() == family {
        Ok(())
    } else {
        Err(ServeError::artifact(
            family.as_str(),
            format!("evaluated with a `{}` model", model.family()),
        ))
    }
}

/// Linear revenue model: `alpha + beta * price_scaled`.
pub fn predict_revenue(model: &Model, price: f64) -> ServeResult<f64> {
    expect_family(model, ModelFamily::Linear)?;
    let inputs = Inputs::new().value("price", price);
    Ok(evaluate(model, &inputs, &EvalOptions::default())?.value)
}

/// Best-seller probability: posterior mean and credible interval of the sigmoid output.
pub fn predict_bestseller(
    model: &Model,
    rating: f64,
    discounted_price: f64,
    opts: &EvalOptions,
) -> ServeResult<BestSellerEstimate> {
    expect_family(model, ModelFamily::Logistic)?;
    let inputs = Inputs::new()
        .value("rating", rating)
        .value("discounted_price", discounted_price);
    let estimate = evaluate(model, &inputs, opts)?;
    let interval = estimate.interval.ok_or_else(|| {
        ServeError::artifact(ModelFamily::Logistic.as_str(), "no posterior draws")
    })?;
    Ok(BestSellerEstimate {
        p_mean: estimate.value,
        p_low: interval.low,
        p_high: interval.high,
    })
}

/// Hierarchical revenue for a registered category from already standardized inputs.
pub fn predict_category_revenue(
    model: &Model,
    category: &str,
    price_scaled: f64,
    rating_scaled: f64,
) -> ServeResult<CategoryRevenue> {
    expect_family(model, ModelFamily::Hierarchical)?;
    let inputs = Inputs::new()
        .category(category)
        .value("price_scaled", price_scaled)
        .value("rating_scaled", rating_scaled);
    let estimate = evaluate(model, &inputs, &EvalOptions::default())?;
    Ok(CategoryRevenue {
        log_revenue: estimate.linear_predictor,
        revenue: estimate.value,
    })
}

/// Expected quantity sold, clamped to the configured plausible range.
pub fn predict_quantity(
    model: &Model,
    discount_percent: f64,
    rating: f64,
    is_weekend: bool,
    opts: &EvalOptions,
) -> ServeResult<f64> {
    expect_family(model, ModelFamily::Poisson)?;
    let inputs = Inputs::new()
        .value("discount_percent", discount_percent)
        .value("rating", rating)
        .value("is_weekend", if is_weekend { 1.0 } else { 0.0 });
    Ok(evaluate(model, &inputs, opts)?.value)
}
