//! Distributed fixed-window rate limiting over a shared key-value store.
//!
//! Many processes pointing a [`RateLimiter`] with the same policy at the
//! same store agree on one quota per identifier. Denials come back as a
//! structured [`FloodWait`] carrying how long to wait before retrying.

pub mod config;
pub mod error;
pub mod flood_wait;
pub mod policy;
pub mod rate_limiter;
pub mod store;
pub mod window_counter;

pub use config::Config;
pub use error::{Error, Result};
pub use flood_wait::FloodWait;
pub use policy::RateLimitPolicy;
pub use rate_limiter::{Admission, RateLimiter};
pub use store::{CounterStore, MemoryStore, RedisStore};
pub use window_counter::WindowCounter;
