//! Named, independent LRU caches for ad hoc per-feature caching.
//!
//! Separate from the tiered pipeline: nothing here touches the pattern table or the remote
//! tiers. Each name gets its own recency-ordered cache, created lazily on first use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_LRU_MAX_ENTRIES, DEFAULT_LRU_TTL_SECS};


/// Creation options for a named cache. Only applied when the cache is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LruOptions {
    pub max_entries: u64,
    /// Default TTL for entries set without one. `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
}

impl Default for LruOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_LRU_MAX_ENTRIES,
            ttl: Some(Duration::from_secs(DEFAULT_LRU_TTL_SECS)),
        }
    }
}

#[derive(Debug, Clone)]
struct NamedValue {
    value: serde_json::Value,
    ttl: Option<Duration>,
}

struct NamedExpiry {
    default_ttl: Option<Duration>,
}

impl Expiry<String, NamedValue> for NamedExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &NamedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl.or(self.default_ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &NamedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl.or(self.default_ttl)
    }
}

/// One recency-ordered cache in the registry.
pub struct NamedCache {
    name: String,
    options: LruOptions,
    entries: Cache<String, NamedValue>,
}

impl NamedCache {
    fn new(name: &str, options: LruOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
            entries: Cache::builder()
                .name(name)
                .max_capacity(options.max_entries)
                .eviction_policy(EvictionPolicy::lru())
                .expire_after(NamedExpiry {
                    default_ttl: options.ttl,
                })
                .build(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &LruOptions {
        &self.options
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let stored = self.entries.get(key)?;
        match serde_json::from_value(stored.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(cache = %self.name, key, error = %e, "named cache value has unexpected shape");
                None
            }
        }
    }

    /// Stores `value`; `ttl` overrides the cache's default TTL for this entry.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(value) => self
                .entries
                .insert(key.to_string(), NamedValue { value, ttl }),
            Err(e) => warn!(cache = %self.name, key, error = %e, "value is not serializable"),
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate entry count; call [`run_pending_tasks`](Self::run_pending_tasks) first for
    /// an exact figure.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl std::fmt::Debug for NamedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

/// Registry of [`NamedCache`]s keyed by name.
#[derive(Default)]
pub struct LruRegistry {
    caches: RwLock<HashMap<String, Arc<NamedCache>>>,
}

impl LruRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache for `name`, creating it with `options` if it does not exist yet.
    pub fn get_or_create(&self, name: &str, options: LruOptions) -> Arc<NamedCache> {
        if let Some(cache) = self.caches.read().get(name) {
            return Arc::clone(cache);
        }

        let mut caches = self.caches.write();
        let cache = caches.entry(name.to_string()).or_insert_with(|| {
            debug!(cache = name, max_entries = options.max_entries, "creating named cache");
            Arc::new(NamedCache::new(name, options))
        });
        Arc::clone(cache)
    }

    /// Returns the cache for `name` if it exists.
    pub fn cache(&self, name: &str) -> Option<Arc<NamedCache>> {
        self.caches.read().get(name).cloned()
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str, key: &str) -> Option<T> {
        self.cache(name)?.get(key)
    }

    /// Stores `value` in `name`, creating the cache with default options if needed.
    pub fn set<T: Serialize + ?Sized>(&self, name: &str, key: &str, value: &T, ttl: Option<Duration>) {
        self.get_or_create(name, LruOptions::default())
            .set(key, value, ttl);
    }

    pub fn delete(&self, name: &str, key: &str) -> bool {
        self.cache(name).is_some_and(|cache| cache.delete(key))
    }

    /// Empties `name` without removing it from the registry.
    pub fn clear(&self, name: &str) {
        if let Some(cache) = self.cache(name) {
            cache.clear();
        }
    }

    /// Drops `name` from the registry entirely.
    pub fn remove_cache(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn entry_count(&self, name: &str) -> Option<u64> {
        self.cache(name).map(|cache| cache.len())
    }

    /// Returns the cached value or computes, stores and returns it.
    ///
    /// Not single-flight: concurrent misses on one key may each call `factory`. The last write
    /// wins, so all later reads converge on one value.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        name: &str,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cache = self.get_or_create(name, LruOptions::default());
        if let Some(value) = cache.get(key) {
            return value;
        }

        let value = factory().await;
        cache.set(key, &value, ttl);
        value
    }

    /// Fallible [`get_or_set`](Self::get_or_set). Errors are returned and never cached.
    pub async fn try_get_or_set<T, E, F, Fut>(
        &self,
        name: &str,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache = self.get_or_create(name, LruOptions::default());
        if let Some(value) = cache.get(key) {
            return Ok(value);
        }

        let value = factory().await?;
        cache.set(key, &value, ttl);
        Ok(value)
    }
}

impl std::fmt::Debug for LruRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruRegistry")
            .field("caches", &self.names())
            .finish()
    }
}
