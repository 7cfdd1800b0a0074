//! Tracing subscriber setup emitting either human readable lines or JSON lines.

use tracing_subscriber::EnvFilter;

use crate::common::config::{AppCfg, LogFormat};
use crate::common::error::{ServeError, ServeResult};

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
///
/// An unparsable `log_filter` is a configuration error.
pub fn init(cfg: &AppCfg) -> ServeResult<()> {
    let filter = EnvFilter::try_new(&cfg.log_filter)
        .map_err(|err| ServeError::config("log_filter", err.to_string()))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = match cfg.log_format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
