use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::policy::RateLimitPolicy;

/// Runtime configuration, read from flags with environment fallbacks.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Prefix for every rate limit key
    #[arg(long, env = "RATE_LIMIT_PREFIX", default_value = "ratelimit")]
    pub key_prefix: String,

    /// Calls admitted per period
    #[arg(long, env = "RATE_LIMIT_RATE", default_value_t = 10)]
    pub rate: u64,

    /// Window length, e.g. `60s` or `1m`
    #[arg(long, env = "RATE_LIMIT_PERIOD", default_value = "60s", value_parser = humantime::parse_duration)]
    pub period: Duration,

    /// Fallback wait when the window TTL is unknown; defaults to the period
    #[arg(long, env = "RATE_LIMIT_RETRY_AFTER", value_parser = humantime::parse_duration)]
    pub retry_after: Option<Duration>,

    /// JSON policy file; when set, the prefix, rate, period and retry-after flags are ignored
    #[arg(long, env = "RATE_LIMIT_POLICY_FILE")]
    pub policy_file: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Build the validated policy this configuration describes.
    pub fn policy(&self) -> Result<RateLimitPolicy> {
        if let Some(path) = &self.policy_file {
            return RateLimitPolicy::from_file(path);
        }

        let mut policy = RateLimitPolicy::new(self.key_prefix.clone(), self.rate, self.period);
        if let Some(retry_after) = self.retry_after {
            policy = policy.with_retry_after(retry_after);
        }
        policy.ensure_valid()?;
        Ok(policy)
    }
}
