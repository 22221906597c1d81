use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::flood_wait::FloodWait;
use crate::policy::RateLimitPolicy;
use crate::store::CounterStore;
use crate::window_counter::WindowCounter;

/// Distributed fixed-window rate limiter.
///
/// Every limiter built with the same policy against the same store enforces
/// one shared quota per identifier; the store is the only synchronization
/// point. Clones share the store handle and the policy.
///
/// Calls landing on either side of a window boundary can admit up to twice
/// `rate` within one `period`. That is inherent to fixed windows.
#[derive(Clone)]
pub struct RateLimiter {
    policy: Arc<RateLimitPolicy>,
    counter: WindowCounter,
}

/// An admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// Calls counted in the current window, including this one.
    pub count: u64,
    /// Calls still admissible in the current window.
    pub remaining: u64,
}

impl RateLimiter {
    /// Build a limiter, failing fast on an unusable policy.
    pub fn new(store: Arc<dyn CounterStore>, policy: RateLimitPolicy) -> Result<Self> {
        policy.ensure_valid()?;

        debug!(
            key_prefix = %policy.key_prefix,
            rate = policy.rate,
            period = ?policy.period,
            retry_after = ?policy.retry_after,
            "Rate limiter created"
        );

        Ok(Self {
            policy: Arc::new(policy),
            counter: WindowCounter::new(store),
        })
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Count a call for `identifier` and decide whether it is admitted.
    ///
    /// Returns [`Error::FloodWait`] when the window already holds `rate`
    /// calls. The denied call is still counted; it is not rolled back.
    pub async fn acquire(&self, identifier: &str) -> Result<Admission> {
        let key = self.policy.key_for(identifier);
        let count = self
            .counter
            .increment_and_get(&key, self.policy.period)
            .await?;

        if count <= self.policy.rate {
            return Ok(Admission {
                count,
                remaining: self.policy.rate - count,
            });
        }

        let wait_time = match self.counter.time_to_reset(&key).await? {
            Some(ttl) => ttl.min(self.policy.period),
            None => self.policy.retry_after,
        };

        debug!(
            identifier = %identifier,
            count,
            wait_time = ?wait_time,
            "Rate limit exceeded"
        );

        Err(Error::FloodWait(FloodWait::new(
            identifier,
            self.policy.rate,
            self.policy.period,
            wait_time,
        )))
    }

    /// Acquire, sleeping out each [`FloodWait`] before trying again.
    ///
    /// Gives up after `max_attempts` calls and returns the last denial.
    /// Store and configuration errors are returned immediately.
    pub async fn acquire_with_retry(&self, identifier: &str, max_attempts: u32) -> Result<Admission> {
        if max_attempts == 0 {
            return Err(Error::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let mut attempt = 1;
        loop {
            match self.acquire(identifier).await {
                Err(Error::FloodWait(wait)) if attempt < max_attempts => {
                    debug!(
                        identifier = %identifier,
                        attempt,
                        wait_time = ?wait.wait_time,
                        "Waiting for rate limit window to reset"
                    );
                    tokio::time::sleep(wait.wait_time).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Calls counted for `identifier` in its current window.
    pub async fn usage(&self, identifier: &str) -> Result<u64> {
        self.counter
            .current_count(&self.policy.key_for(identifier))
            .await
    }

    /// Time until the window for `identifier` resets; zero when none is open.
    pub async fn remaining(&self, identifier: &str) -> Result<Duration> {
        let ttl = self
            .counter
            .time_to_reset(&self.policy.key_for(identifier))
            .await?;
        Ok(ttl.unwrap_or(Duration::ZERO))
    }

    /// Drop the current window for `identifier`.
    pub async fn reset(&self, identifier: &str) -> Result<bool> {
        self.counter.clear(&self.policy.key_for(identifier)).await
    }
}
