use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};

/// Immutable rate limit policy for one limiter instance.
///
/// `rate` calls are admitted per `period` for each identifier; the
/// `rate + 1`-th call inside the same window is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(from = "RawPolicy")]
pub struct RateLimitPolicy {
    /// Namespace for every key this limiter writes.
    #[validate(length(min = 1, message = "key prefix cannot be empty"))]
    pub key_prefix: String,

    #[validate(range(min = 1, message = "rate must be at least 1"))]
    pub rate: u64,

    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_period"))]
    pub period: Duration,

    /// Wait hint used when the store cannot report a remaining TTL.
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
}

/// On-disk shape; `retry_after` falls back to `period` when omitted.
#[derive(Deserialize)]
struct RawPolicy {
    key_prefix: String,
    rate: u64,
    #[serde(with = "humantime_serde")]
    period: Duration,
    #[serde(default, with = "humantime_serde::option")]
    retry_after: Option<Duration>,
}

impl From<RawPolicy> for RateLimitPolicy {
    fn from(raw: RawPolicy) -> Self {
        Self {
            key_prefix: raw.key_prefix,
            rate: raw.rate,
            period: raw.period,
            retry_after: raw.retry_after.unwrap_or(raw.period),
        }
    }
}

/// Longest period a store TTL can carry (Redis `PEXPIRE` takes a signed
/// 64-bit millisecond count).
pub const MAX_PERIOD_MILLIS: u128 = i64::MAX as u128;

// Store TTLs have millisecond granularity.
fn validate_period(period: &Duration) -> std::result::Result<(), ValidationError> {
    let millis = period.as_millis();
    if millis == 0 {
        return Err(ValidationError::new("period")
            .with_message("period must be at least 1ms".into()));
    }
    if millis > MAX_PERIOD_MILLIS {
        return Err(ValidationError::new("period")
            .with_message(format!("period must be at most {}ms", MAX_PERIOD_MILLIS).into()));
    }
    Ok(())
}

impl RateLimitPolicy {
    /// Create a policy whose fallback wait equals the window length.
    pub fn new(key_prefix: impl Into<String>, rate: u64, period: Duration) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            rate,
            period,
            retry_after: period,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Load a policy from a JSON file, e.g.
    /// `{"key_prefix": "api", "rate": 10, "period": "1m", "retry_after": "20s"}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read policy file {}: {}", path.display(), e))
        })?;
        let policy: RateLimitPolicy = serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Invalid policy file {}: {}", path.display(), e))
        })?;
        policy.ensure_valid()?;
        Ok(policy)
    }

    /// Reject unusable policies instead of clamping them.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(Error::from)
    }

    /// Store key for an identifier: `key_prefix:identifier`.
    pub fn key_for(&self, identifier: &str) -> String {
        format!("{}:{}", self.key_prefix, identifier)
    }
}
