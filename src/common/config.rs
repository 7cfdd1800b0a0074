//! Runtime configuration loaded from an optional TOML file and the environment.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`BAYES_SERVE_*`)
//! 2. TOML file (`BAYES_SERVE_CONFIG`, falling back to `bayes-serve.toml`)
//! 3. Compiled defaults

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::common::error::{ServeError, ServeResult};

const DEFAULT_CONFIG_FILE: &str = "bayes-serve.toml";

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub artifact_root: PathBuf,
    pub prediction_log: PathBuf,
    pub interval: IntervalCfg,
    pub quantity_clamp: ClampCfg,
    /// Serve built-in quantity coefficients when the artifact cannot be loaded.
    pub allow_placeholder: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
}

/// Quantile bounds of the credible interval.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalCfg {
    pub low: f64,
    pub high: f64,
}

/// Plausible per-order quantity range; predictions outside it are clamped.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClampCfg {
    pub min: f64,
    pub max: f64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for IntervalCfg {
    fn default() -> Self {
        Self {
            low: 0.05,
            high: 0.95,
        }
    }
}

impl Default for ClampCfg {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 50.0,
        }
    }
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("./models"),
            prediction_log: PathBuf::from("./reports/predictions_log.jsonl"),
            interval: IntervalCfg::default(),
            quantity_clamp: ClampCfg::default(),
            allow_placeholder: false,
            log_format: LogFormat::Text,
            log_filter: "info".to_string(),
        }
    }
}

impl AppCfg {
    /// Resolve the configuration from the process environment and optional file.
    pub fn load() -> ServeResult<Self> {
        let explicit = env::var("BAYES_SERVE_CONFIG").ok().map(PathBuf::from);
        let mut cfg = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> ServeResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| ServeError::io(path, err))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> ServeResult<Self> {
        let cfg: Self = toml::from_str(raw).map_err(|err| ServeError::config("<toml>", err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay values from a key lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> ServeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("BAYES_SERVE_ARTIFACT_ROOT") {
            self.artifact_root = PathBuf::from(root);
        }
        if let Some(log) = lookup("BAYES_SERVE_PREDICTION_LOG") {
            self.prediction_log = PathBuf::from(log);
        }
        if let Some(v) = lookup("BAYES_SERVE_CI_LOW") {
            self.interval.low = parse_f64("BAYES_SERVE_CI_LOW", &v)?;
        }
        if let Some(v) = lookup("BAYES_SERVE_CI_HIGH") {
            self.interval.high = parse_f64("BAYES_SERVE_CI_HIGH", &v)?;
        }
        if let Some(v) = lookup("BAYES_SERVE_QUANTITY_MIN") {
            self.quantity_clamp.min = parse_f64("BAYES_SERVE_QUANTITY_MIN", &v)?;
        }
        if let Some(v) = lookup("BAYES_SERVE_QUANTITY_MAX") {
            self.quantity_clamp.max = parse_f64("BAYES_SERVE_QUANTITY_MAX", &v)?;
        }
        if let Some(v) = lookup("BAYES_SERVE_ALLOW_PLACEHOLDER") {
            self.allow_placeholder = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("BAYES_SERVE_LOG_FORMAT") {
            self.log_format = match v.trim() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(ServeError::config(
                        "BAYES_SERVE_LOG_FORMAT",
                        format!("expected `text` or `json`, got `{other}`"),
                    ))
                }
            };
        }
        if let Some(v) = lookup("BAYES_SERVE_LOG") {
            self.log_filter = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> ServeResult<()> {
        let IntervalCfg { low, high } = self.interval;
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
            return Err(ServeError::config(
                "interval",
                format!("need 0 <= low < high <= 1, got low={low} high={high}"),
            ));
        }
        let ClampCfg { min, max } = self.quantity_clamp;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ServeError::config(
                "quantity_clamp",
                format!("need finite min <= max, got min={min} max={max}"),
            ));
        }
        EnvFilter::try_new(&self.log_filter)
            .map_err(|err| ServeError::config("log_filter", err.to_string()))?;
        Ok(())
    }
}

fn parse_f64(key: &str, value: &str) -> ServeResult<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| ServeError::config(key, format!("`{value}` is not a number")))
}
