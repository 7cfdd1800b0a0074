//! Typed entry point: pick a family, evaluate, log the record.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::artifact::domain::{Model, ModelFamily, Provenance};
use crate::artifact::repo_fs::{ArtifactRepo, FsArtifactRepo};
use crate::artifact::service::ArtifactCache;
use crate::common::config::AppCfg;
use crate::common::error::ServeResult;
use crate::common::time;
use crate::evaluation::domain::ProbabilityBand;
use crate::evaluation::service::probability_band;
use crate::inference::domain::{BestSellerEstimate, CategoryRevenue, EvalOptions};
use crate::inference::service as inference;

use super::sink::{JsonlSink, PredictionRecord, PredictionSink};

/// Raw inputs plus the family to evaluate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PredictionRequest {
    Linear {
        price: f64,
    },
    Logistic {
        rating: f64,
        discounted_price: f64,
    },
    /// Price and rating must already be standardized.
    Hierarchical {
        category: String,
        price_scaled: f64,
        rating_scaled: f64,
    },
    Poisson {
        discount_percent: f64,
        rating: f64,
        is_weekend: bool,
    },
}

impl PredictionRequest {
    pub fn family(&self) -> ModelFamily {
        match self {
            PredictionRequest::Linear { .. } => ModelFamily::Linear,
            PredictionRequest::Logistic { .. } => ModelFamily::Logistic,
            PredictionRequest::Hierarchical { .. } => ModelFamily::Hierarchical,
            PredictionRequest::Poisson { .. } => ModelFamily::Poisson,
        }
    }

    fn inputs(&self) -> Value {
        match self {
            PredictionRequest::Linear { price } => json!({ "price": price }),
            PredictionRequest::Logistic {
                rating,
                discounted_price,
            } => json!({ "rating": rating, "discounted_price": discounted_price }),
            PredictionRequest::Hierarchical {
                category,
                price_scaled,
                rating_scaled,
            } => json!({
                "category": category,
                "price_scaled": price_scaled,
                "rating_scaled": rating_scaled,
            }),
            PredictionRequest::Poisson {
                discount_percent,
                rating,
                is_weekend,
            } => json!({
                "discount_percent": discount_percent,
                "rating": rating,
                "is_weekend": u8::from(*is_weekend),
            }),
        }
    }
}

/// Family-specific output.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PredictionResponse {
    Linear {
        revenue: f64,
    },
    Logistic {
        #[serde(flatten)]
        estimate: BestSellerEstimate,
        band: ProbabilityBand,
    },
    Hierarchical {
        #[serde(flatten)]
        revenue: CategoryRevenue,
    },
    Poisson {
        quantity: f64,
    },
}

impl PredictionResponse {
    fn outputs(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("model");
        }
        value
    }
}

/// Response plus where the coefficients came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub response: PredictionResponse,
    pub provenance: Provenance,
    pub latency_us: u64,
}

/// Serves predictions from cached artifacts and logs each one.
pub struct Predictor<R = FsArtifactRepo> {
    cache: ArtifactCache<R>,
    sink: Box<dyn PredictionSink>,
    opts: EvalOptions,
}

impl Predictor<FsArtifactRepo> {
    /// Filesystem artifacts and a JSON-lines prediction log, both from `cfg`.
    pub fn from_config(cfg: &AppCfg) -> Self {
        Self::new(
            ArtifactCache::from_config(cfg),
            Box::new(JsonlSink::new(cfg.prediction_log.clone())),
            EvalOptions::from(cfg),
        )
    }
}

impl<R: ArtifactRepo> Predictor<R> {
    pub fn new(cache: ArtifactCache<R>, sink: Box<dyn PredictionSink>, opts: EvalOptions) -> Self {
        Self { cache, sink, opts }
    }

    /// Shared model for a family, loading it if needed.
    pub fn model(&self, family: ModelFamily) -> ServeResult<Arc<Model>> {
        self.cache.get(family)
    }

    /// Load every family up front; returns the first failure.
    pub fn warm_up(&self) -> ServeResult<()> {
        for family in ModelFamily::ALL {
            self.cache.get(family)?;
        }
        Ok(())
    }

    pub fn predict(&self, request: &PredictionRequest) -> ServeResult<Prediction> {
        let model = self.cache.get(request.family())?;
        let started = Instant::now();

        let response = match request {
            PredictionRequest::Linear { price } => PredictionResponse::Linear {
                revenue: inference::predict_revenue(&model, *price)?,
            },
            PredictionRequest::Logistic {
                rating,
                discounted_price,
            } => {
                let estimate =
                    inference::predict_bestseller(&model, *rating, *discounted_price, &self.opts)?;
                PredictionResponse::Logistic {
                    band: probability_band(estimate.p_mean),
                    estimate,
                }
            }
            PredictionRequest::Hierarchical {
                category,
                price_scaled,
                rating_scaled,
            } => PredictionResponse::Hierarchical {
                revenue: inference::predict_category_revenue(
                    &model,
                    category,
                    *price_scaled,
                    *rating_scaled,
                )?,
            },
            PredictionRequest::Poisson {
                discount_percent,
                rating,
                is_weekend,
            } => PredictionResponse::Poisson {
                quantity: inference::predict_quantity(
                    &model,
                    *discount_percent,
                    *rating,
                    *is_weekend,
                    &self.opts,
                )?,
            },
        };
        let latency_us = started.elapsed().as_micros() as u64;

        let record = PredictionRecord {
            timestamp: time::now(),
            model: request.family(),
            inputs: request.inputs(),
            outputs: response.outputs(),
            provenance: model.provenance().clone(),
        };
        if let Err(err) = self.sink.record(&record) {
            warn!(model = request.family().as_str(), error = %err, "prediction not logged");
        }
        info!(
            model = request.family().as_str(),
            latency_us,
            placeholder = model.provenance().is_placeholder(),
            "prediction served"
        );

        Ok(Prediction {
            response,
            provenance: model.provenance().clone(),
            latency_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use approx::assert_relative_eq;

    use super::*;
    use crate::api::sink::MemorySink;
    use crate::artifact::domain::{ArtifactFile, PosteriorFile, ScalarOrDraws};
    use crate::common::error::ServeError;
    use crate::features::domain::ScalingTransform;

    fn means(pairs: &[(&str, f64)]) -> PosteriorFile {
        PosteriorFile::Means {
            coefficients: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn artifact(model: ModelFamily, transform: ScalingTransform, posterior: PosteriorFile) -> ArtifactFile {
        ArtifactFile {
            model,
            version: Some("test".to_string()),
            transform,
            posterior,
            categories: None,
            metrics: None,
        }
    }

    /// Writes one artifact per family into `root`.
    fn seed(root: &std::path::Path) {
        let repo = FsArtifactRepo::with_root(root);
        repo.put_artifact(&artifact(
            ModelFamily::Linear,
            ScalingTransform::new().with("price", 100.0, 10.0),
            means(&[("alpha", 10.0), ("beta", 2.0)]),
        ))
        .unwrap();
        repo.put_artifact(&artifact(
            ModelFamily::Logistic,
            ScalingTransform::new()
                .with("rating", 0.0, 10.0)
                .with("discounted_price", 0.0, 10.0),
            PosteriorFile::Draws {
                coefficients: BTreeMap::from([
                    ("beta_0".to_string(), vec![-0.01, 0.0, 0.01]),
                    ("beta_rating".to_string(), vec![0.99, 1.0, 1.01]),
                    ("beta_price".to_string(), vec![-1.01, -1.0, -0.99]),
                ]),
            },
        ))
        .unwrap();
        let mut hier = artifact(
            ModelFamily::Hierarchical,
            ScalingTransform::new(),
            means(&[("b_p", 0.5), ("b_r", 0.1)]),
        );
        hier.categories = Some(BTreeMap::from([
            ("electronica".to_string(), ScalarOrDraws::Scalar(1.0)),
            ("ropa".to_string(), ScalarOrDraws::Scalar(2.0)),
        ]));
        repo.put_artifact(&hier).unwrap();
        repo.put_artifact(&artifact(
            ModelFamily::Poisson,
            ScalingTransform::new()
                .with("discount_percent", 15.0, 10.0)
                .with("rating", 4.0, 0.5),
            means(&[
                ("intercept", 0.8),
                ("beta_discount", 0.12),
                ("beta_rating", 0.22),
                ("beta_weekend", 0.08),
            ]),
        ))
        .unwrap();
    }

    struct SharedSink(Arc<MemorySink>);

    impl PredictionSink for SharedSink {
        fn record(&self, record: &PredictionRecord) -> ServeResult<()> {
            self.0.record(record)
        }
    }

    fn predictor(root: &std::path::Path) -> (Predictor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let predictor = Predictor::new(
            ArtifactCache::new(FsArtifactRepo::with_root(root), false),
            Box::new(SharedSink(sink.clone())),
            EvalOptions::default(),
        );
        (predictor, sink)
    }

    #[test]
    fn serves_every_family_and_logs_each() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let (predictor, sink) = predictor(dir.path());
        predictor.warm_up().unwrap();

        let linear = predictor.predict(&PredictionRequest::Linear { price: 110.0 }).unwrap();
        match linear.response {
            PredictionResponse::Linear { revenue } => assert_relative_eq!(revenue, 12.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(linear.provenance, Provenance::Loaded { .. }));

        let logistic = predictor
            .predict(&PredictionRequest::Logistic {
                rating: 40.0,
                discounted_price: 20.0,
            })
            .unwrap();
        match logistic.response {
            PredictionResponse::Logistic { estimate, band } => {
                assert!(estimate.p_low <= estimate.p_mean && estimate.p_mean <= estimate.p_high);
                assert_eq!(band, ProbabilityBand::High);
            }
            other => panic!("unexpected {other:?}"),
        }

        let hier = predictor
            .predict(&PredictionRequest::Hierarchical {
                category: "electronica".to_string(),
                price_scaled: 1.0,
                rating_scaled: 0.0,
            })
            .unwrap();
        match hier.response {
            PredictionResponse::Hierarchical { revenue } => {
                assert_relative_eq!(revenue.log_revenue, 1.5)
            }
            other => panic!("unexpected {other:?}"),
        }

        let qty = predictor
            .predict(&PredictionRequest::Poisson {
                discount_percent: 15.0,
                rating: 4.0,
                is_weekend: false,
            })
            .unwrap();
        match qty.response {
            PredictionResponse::Poisson { quantity } => assert_relative_eq!(quantity, 0.8f64.exp()),
            other => panic!("unexpected {other:?}"),
        }

        let records = sink.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].inputs["is_weekend"], json!(0));
        assert!(records[3].outputs["quantity"].is_number());
        assert!(records[1].outputs.get("model").is_none());
        assert_eq!(records[1].outputs["band"], json!("high"));
        assert_eq!(records[2].outputs["revenue"], json!(1.5f64.exp()));
        match &records[0].provenance {
            Provenance::Loaded { path, digest } => {
                assert_eq!(path, &dir.path().join("linear").join("artifact.json"));
                assert_eq!(digest.len(), 64);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failed_prediction_is_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let (predictor, sink) = predictor(dir.path());
        let err = predictor
            .predict(&PredictionRequest::Hierarchical {
                category: "juguetes".to_string(),
                price_scaled: 0.0,
                rating_scaled: 0.0,
            })
            .unwrap_err();
        assert!(matches!(err, ServeError::UnknownCategory { .. }));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn missing_artifact_surfaces_without_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let (predictor, _) = predictor(dir.path());
        let err = predictor
            .predict(&PredictionRequest::Poisson {
                discount_percent: 10.0,
                rating: 4.0,
                is_weekend: true,
            })
            .unwrap_err();
        assert!(matches!(err, ServeError::ArtifactIo { .. }));
    }

    #[test]
    fn sink_failure_does_not_fail_prediction() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let predictor = Predictor::new(
            ArtifactCache::new(FsArtifactRepo::with_root(dir.path()), false),
            // Pointing the log at a directory makes every append fail.
            Box::new(JsonlSink::new(dir.path())),
            EvalOptions::default(),
        );
        assert!(predictor.predict(&PredictionRequest::Linear { price: 100.0 }).is_ok());
    }

    #[test]
    fn from_config_uses_placeholder_and_log_path() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppCfg {
            artifact_root: dir.path().join("models"),
            prediction_log: dir.path().join("reports").join("log.jsonl"),
            allow_placeholder: true,
            ..AppCfg::default()
        };
        let predictor = Predictor::from_config(&cfg);
        let prediction = predictor
            .predict(&PredictionRequest::Poisson {
                discount_percent: 15.0,
                rating: 4.0,
                is_weekend: false,
            })
            .unwrap();
        assert!(prediction.provenance.is_placeholder());

        let log = fs::read_to_string(&cfg.prediction_log).unwrap();
        let line: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(line["provenance"]["source"], json!("placeholder"));
        assert!(line["provenance"]["reason"].is_string());
        assert_eq!(line["model"], json!("poisson"));
    }

    #[test]
    fn request_round_trips_through_json() {
        let req: PredictionRequest = serde_json::from_str(
            r#"{"model": "poisson", "discount_percent": 20.0, "rating": 4.5, "is_weekend": true}"#,
        )
        .unwrap();
        assert_eq!(req.family(), ModelFamily::Poisson);
        assert_eq!(req.inputs()["is_weekend"], json!(1));
    }
}
