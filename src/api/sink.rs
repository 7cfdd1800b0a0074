//! Prediction log sinks.
//!
//! A sink receives one flat record per successful prediction. The predictor
//! never fails a prediction because the sink did.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::artifact::domain::{ModelFamily, Provenance};
use crate::common::error::{ServeError, ServeResult};

/// One logged prediction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub model: ModelFamily,
    pub inputs: Value,
    pub outputs: Value,
    /// Includes the artifact path and digest for loaded models.
    pub provenance: Provenance,
}

pub trait PredictionSink: Send + Sync {
    fn record(&self, record: &PredictionRecord) -> ServeResult<()>;
}

/// Appends records as JSON lines, creating the parent directory on first write.
pub struct JsonlSink {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink_err(err: impl std::fmt::Display) -> ServeError {
    ServeError::Sink {
        message: err.to_string(),
    }
}

impl PredictionSink for JsonlSink {
    fn record(&self, record: &PredictionRecord) -> ServeResult<()> {
        let mut line = serde_json::to_vec(record).map_err(sink_err)?;
        line.push(b'\n');

        let _lock = self.guard.lock().map_err(sink_err)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(sink_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(sink_err)?;
        file.write_all(&line).map_err(sink_err)
    }
}

/// Keeps records in memory; handy for embedding and tests.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl PredictionSink for MemorySink {
    fn record(&self, record: &PredictionRecord) -> ServeResult<()> {
        self.records
            .lock()
            .map_err(sink_err)?
            .push(record.clone());
        Ok(())
    }
}

/// Discards everything.
pub struct NullSink;

impl PredictionSink for NullSink {
    fn record(&self, _: &PredictionRecord) -> ServeResult<()> {
        Ok(())
    }
}
