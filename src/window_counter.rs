//! Fixed-window counting against a shared store.

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::error::{Error, Result};
use crate::store::CounterStore;

/// Counts calls per key inside fixed windows held by the store.
///
/// The window for a key starts with its first increment and ends when the
/// store expires the key. No counter state is kept in process memory.
#[derive(Clone)]
pub struct WindowCounter {
    store: Arc<dyn CounterStore>,
}

impl WindowCounter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Count one call for `key` and return the number of calls in the
    /// current window, including this one.
    pub async fn increment_and_get(&self, key: &str, period: Duration) -> Result<u64> {
        let count = self.store.incr_with_expiry(key, period).await?;
        trace!(key = %key, count, "Window counter incremented");

        match u64::try_from(count) {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(Error::StoreUnavailable(format!(
                "store returned invalid count {} for key {}",
                count, key
            ))),
        }
    }

    /// Time until the window for `key` resets, `None` when the store has no
    /// positive TTL for it (absent key, or expired between calls).
    pub async fn time_to_reset(&self, key: &str) -> Result<Option<Duration>> {
        let ttl = self.store.ttl(key).await?;
        Ok(ttl.filter(|remaining| !remaining.is_zero()))
    }

    /// Calls counted so far in the current window; 0 when no window is open.
    pub async fn current_count(&self, key: &str) -> Result<u64> {
        let count = self.store.get(key).await?.unwrap_or(0);
        u64::try_from(count).map_err(|_| {
            Error::StoreUnavailable(format!(
                "store returned invalid count {} for key {}",
                count, key
            ))
        })
    }

    /// Close the window for `key` immediately.
    pub async fn clear(&self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }
}
