// lib.rs - posterior evaluation for the sales models
pub mod common;
pub mod features;
pub mod artifact;
pub mod inference;
pub mod evaluation;
pub mod api;

pub use api::{PredictionRequest, PredictionResponse, Predictor};
pub use artifact::{ArtifactCache, Model, ModelFamily};
pub use common::{AppCfg, ServeError, ServeResult};
