//! Store trait and the failure-absorbing client wrapper used by the remote tiers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::StoreResult;
use crate::cache::CacheEntry;

/// A network-reachable (or in-process) string key-value service.
///
/// Implementations report failures as [`StoreError`](super::StoreError). Callers inside this
/// crate never use a store directly; they go through [`BackingStoreClient`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically stores `value` only if `key` is absent. Returns `true` if stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Atomically deletes `key` only if it currently holds `expected`. Returns `true` if deleted.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Wraps a [`KeyValueStore`] so that no failure ever reaches the caller.
///
/// Errors are logged with the tier label and converted: reads become misses, writes and
/// deletes become no-ops that return `false`.
#[derive(Clone)]
pub struct BackingStoreClient {
    tier: &'static str,
    store: Arc<dyn KeyValueStore>,
}

impl BackingStoreClient {
    pub fn new(tier: &'static str, store: Arc<dyn KeyValueStore>) -> Self {
        Self { tier, store }
    }

    /// Returns the tier label used in logs.
    #[inline]
    pub fn tier(&self) -> &'static str {
        self.tier
    }

    /// Returns the wrapped store.
    #[inline]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Returns `true` if both clients point at the same physical store.
    pub fn shares_store_with(&self, other: &BackingStoreClient) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tier = self.tier, store = self.store.name(), key, error = %e, "store get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        match self.store.set_with_ttl(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(tier = self.tier, store = self.store.name(), key, error = %e, "store set failed, skipping");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(tier = self.tier, store = self.store.name(), key, error = %e, "store delete failed, skipping");
                false
            }
        }
    }

    pub async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> bool {
        match self.store.set_if_absent(key, value, ttl).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(tier = self.tier, store = self.store.name(), key, error = %e, "conditional set failed");
                false
            }
        }
    }

    pub async fn delete_if_equals(&self, key: &str, expected: &str) -> bool {
        match self.store.delete_if_equals(key, expected).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(tier = self.tier, store = self.store.name(), key, error = %e, "conditional delete failed");
                false
            }
        }
    }

    /// Returns `true` if the store answers a ping.
    pub async fn is_reachable(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(tier = self.tier, store = self.store.name(), error = %e, "store ping failed");
                false
            }
        }
    }

    /// Reads and decodes a [`CacheEntry`]. Undecodable payloads are logged and reported as a miss.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(tier = self.tier, key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encodes and writes a [`CacheEntry`] with the given TTL.
    pub async fn set_entry(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> bool {
        match serde_json::to_string(entry) {
            Ok(raw) => self.set_with_ttl(key, &raw, ttl).await,
            Err(e) => {
                warn!(tier = self.tier, key, error = %e, "failed to encode cache entry");
                false
            }
        }
    }
}

impl fmt::Debug for BackingStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStoreClient")
            .field("tier", &self.tier)
            .field("store", &self.store.name())
            .finish()
    }
}
