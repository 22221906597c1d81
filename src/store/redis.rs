use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;

use super::CounterStore;
use crate::error::{Error, Result};

// INCR and the conditional PEXPIRE run as one script so no other client can
// observe the key without an expiry.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis-backed counter store.
///
/// Holds a multiplexed connection; clones share it. Reconnection and retry
/// policy belong to the caller.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    increment: Script,
}

impl RedisStore {
    /// Open a client for `redis_url` and establish the connection.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to create Redis client: {}", e)))?;
        Self::from_client(&client).await
    }

    pub async fn from_client(client: &Client) -> Result<Self> {
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Failed to connect to Redis: {}", e)))?;

        tracing::debug!("Connected to Redis");

        Ok(Self {
            connection,
            increment: Script::new(INCREMENT_SCRIPT),
        })
    }
}

fn period_millis(period: Duration) -> Result<u64> {
    let millis = u64::try_from(period.as_millis())
        .map_err(|_| Error::Configuration(format!("period {:?} is too long", period)))?;
    if millis == 0 {
        return Err(Error::Configuration("period must be at least 1ms".to_string()));
    }
    Ok(millis)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr_with_expiry(&self, key: &str, period: Duration) -> Result<i64> {
        let millis = period_millis(period)?;
        let mut conn = self.connection.clone();

        self.increment
            .key(key)
            .arg(millis)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Increment script failed: {}", e)))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection.clone();

        // -2: key absent, -1: no expiry
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("PTTL failed: {}", e)))?;

        Ok(u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connection.clone();

        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("GET failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();

        let deleted: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("DEL failed: {}", e)))?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Ping failed: {}", e)))?;
        Ok(())
    }
}
