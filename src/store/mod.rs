//! Shared counter stores.
//!
//! The rate limiter only ever talks to the store through [`CounterStore`].
//! Any key-value system that can increment a key and attach an expiry in a
//! single atomic step can back it.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Atomic counter operations required from the shared store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the new value.
    ///
    /// When the key has no expiry after the increment (it was just created,
    /// or it lost its TTL), the expiry is set to `period` in the same atomic
    /// step. An existing expiry is never extended.
    async fn incr_with_expiry(&self, key: &str, period: Duration) -> Result<i64>;

    /// Remaining time to live of `key`, `None` when the key is absent or
    /// carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Current value of `key` without modifying it.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Remove `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}
