//! Redis-backed counter store.
//!
//! Counters are plain integer strings under the window key, expired with
//! `SET .. EX`. The admission decision runs as a single Lua script so the
//! read, the arm and the increment cannot interleave with another caller,
//! whichever process it runs in.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError, Script};
use tracing::{debug, info};

use super::{Admission, CounterStore, StoreError};

/// Fixed-window admission, evaluated atomically by Redis.
///
/// KEYS[1] = window key, ARGV[1] = max requests, ARGV[2] = window in seconds.
/// Returns `{allowed, count}`, or a `NOTINT` error reply when the key holds
/// something other than an integer.
const ADMIT_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    redis.call('SET', KEYS[1], 1, 'EX', ARGV[2])
    return {1, 1}
end
current = tonumber(current)
if not current then
    return redis.error_reply('NOTINT counter is not an integer')
end
if current < tonumber(ARGV[1]) then
    return {1, redis.call('INCR', KEYS[1])}
end
return {0, current}
"#;

/// Error code raised by `ADMIT_SCRIPT` for a non-integer counter.
const NOT_INTEGER_CODE: &str = "NOTINT";

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_io_error()
            || err.is_timeout()
        {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Counter store shared through Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    admit_script: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!(url = %url, "Connected to Redis counter store");

        Ok(Self {
            connection,
            admit_script: Script::new(ADMIT_SCRIPT),
        })
    }

    /// Delete `key`. Windows normally end by expiry; this is for resets.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// Redis reports a non-integer under a counter key as a type error; the
/// admission script reports it with its own error code.
fn map_value_error(key: &str, err: RedisError) -> StoreError {
    if err.kind() == ErrorKind::TypeError || err.code() == Some(NOT_INTEGER_CODE) {
        StoreError::InvalidValue {
            key: key.to_string(),
        }
    } else {
        err.into()
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| map_value_error(key, e))
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        conn.incr(key, 1).await.map_err(|e| map_value_error(key, e))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection.clone();
        let millis: i64 = conn.pttl(key).await?;
        // -2: no such key, -1: key without expiry
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn admit(
        &self,
        key: &str,
        max_requests: u64,
        ttl: Duration,
    ) -> Result<Admission, StoreError> {
        let mut conn = self.connection.clone();
        let (allowed, count): (i64, i64) = self
            .admit_script
            .key(key)
            .arg(max_requests)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_value_error(key, e))?;

        debug!(key = %key, allowed = allowed == 1, count = count, "Redis admission evaluated");

        Ok(Admission {
            allowed: allowed == 1,
            count,
        })
    }
}

/// Redis expiries are whole seconds; never send zero, which Redis rejects.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
