//! Time helpers used by the prediction log.

use chrono::{DateTime, Utc};

/// Current wall-clock time in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
