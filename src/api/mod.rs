//! Public entry points: the predictor facade and its prediction log.

pub mod facade;
pub mod sink;

pub use facade::{Prediction, PredictionRequest, PredictionResponse, Predictor};
pub use sink::{JsonlSink, MemorySink, NullSink, PredictionRecord, PredictionSink};
