//! Time abstraction.
//!
//! The cache, the pipeline timestamps and the live stream pings all read time
//! through [`Clock`] so tests can drive them deterministically.

use chrono::{DateTime, SecondsFormat, Utc};

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    fn now_ts_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// ISO-8601 timestamp with millisecond precision and a `Z` suffix.
    fn now_iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
