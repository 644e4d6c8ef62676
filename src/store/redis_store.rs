//! Redis-backed [`KeyValueStore`] over a deadpool connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::{AsyncCommands, Script};

use super::client::KeyValueStore;
use super::error::{StoreError, StoreResult};

/// Deletes KEYS[1] only when it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Max pooled connections.
    pub pool_size: usize,
    /// Wait/create/recycle timeout applied to the pool.
    pub timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: crate::constants::DEFAULT_REDIS_URL.to_string(),
            pool_size: 16,
            timeout: Duration::from_millis(500),
        }
    }
}

pub struct RedisStore {
    pool: Pool,
    release_script: Script,
}

impl RedisStore {
    /// Builds the pool. Does not open a connection; the first command does.
    pub fn connect(config: &RedisStoreConfig) -> StoreResult<Self> {
        // `from_url` leaves `pool` unset, which would mean deadpool defaults and no timeouts.
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(config.timeout);
        timeouts.create = Some(config.timeout);
        timeouts.recycle = Some(config.timeout);

        let mut pool = PoolConfig::new(config.pool_size.max(1));
        pool.timeouts = timeouts;

        let mut pool_config = RedisPoolConfig::from_url(&config.url);
        pool_config.pool = Some(pool);

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Unavailable {
                store: "redis".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            release_script: Script::new(COMPARE_AND_DELETE),
        }
    }

    /// Upper bound on pooled connections.
    pub fn max_connections(&self) -> usize {
        self.pool.status().max_size
    }

    pub fn timeouts(&self) -> Timeouts {
        self.pool.timeouts()
    }

    /// Redis expiry resolution is one second for `SET EX`; round sub-second TTLs up.
    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        (ttl.as_millis() as u64).max(1)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.set_ex(key, value, Self::ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisStore")
            .field("pool_size", &status.size)
            .field("pool_available", &status.available)
            .finish()
    }
}
