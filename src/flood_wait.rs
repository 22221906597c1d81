//! The structured denial returned when an identifier is over its rate.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::time::Duration;

/// A denied acquisition.
///
/// Carries everything a caller needs to throttle itself: sleep for
/// `wait_time`, then try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodWait {
    pub identifier: String,
    pub rate: u64,
    pub period: Duration,
    pub wait_time: Duration,
}

impl FloodWait {
    pub fn new(identifier: &str, rate: u64, period: Duration, wait_time: Duration) -> Self {
        Self {
            identifier: identifier.to_string(),
            rate,
            period,
            wait_time,
        }
    }

    /// `wait_time` rounded up to whole seconds, so sleeping that long never
    /// wakes up inside the window that caused the denial.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.wait_time.as_secs();
        if self.wait_time.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Rate in `calls/period` form, e.g. `10/1m`.
    pub fn rate_string(&self) -> String {
        format!("{}/{}", self.rate, humantime::format_duration(self.period))
    }
}

impl fmt::Display for FloodWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate limit exceeded for `{}`: {} calls per {}, retry in {}",
            self.identifier,
            self.rate,
            humantime::format_duration(self.period),
            humantime::format_duration(self.wait_time)
        )
    }
}

impl std::error::Error for FloodWait {}

impl Serialize for FloodWait {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("FloodWait", 4)?;
        state.serialize_field("message", "Rate limit exceeded")?;
        state.serialize_field("identifier", &self.identifier)?;
        state.serialize_field("rate", &self.rate_string())?;
        state.serialize_field("retry_after", &self.retry_after_secs())?;
        state.end()
    }
}
