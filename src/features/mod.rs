//! Feature scaler adapter: standardize raw inputs with the training transform.

pub mod domain;
pub mod service;

pub use domain::{FeatureStats, ScalingTransform};
pub use service::{standardize, standardize_one};
