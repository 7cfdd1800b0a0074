//! Posterior evaluator: linear predictor per draw, link, then summaries.
//!
//! Evaluation is pure and synchronous; models are shared read-only through `Arc`.

pub mod domain;
pub mod service;
pub mod summary;

pub use domain::{BestSellerEstimate, CategoryRevenue, CredibleInterval, Estimate, EvalOptions, Link};
pub use service::{
    evaluate, predict_bestseller, predict_category_revenue, predict_quantity, predict_revenue,
    Inputs,
};
