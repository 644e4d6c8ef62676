//! In-process [`KeyValueStore`] with per-entry TTL.
//!
//! Serves as the L1 memory tier. Writes are serialized through a mutex so the conditional
//! operations used by the lock manager stay atomic with respect to plain writes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use parking_lot::Mutex;

use super::client::KeyValueStore;
use super::error::StoreResult;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    ttl: Duration,
}

struct StoredValueExpiry;

impl Expiry<String, StoredValue> for StoredValueExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct MemoryStore {
    entries: Cache<String, StoredValue>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Creates a store holding at most `capacity` entries.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .expire_after(StoredValueExpiry)
                .build(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Runs pending eviction and expiry bookkeeping.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|stored| stored.value)
    }

    fn write(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                ttl,
            },
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(crate::constants::DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read(key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        self.write(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        self.entries.invalidate(key);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();
        if self.read(key).is_some() {
            return Ok(false);
        }
        self.write(key, value, ttl);
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();
        match self.read(key) {
            Some(current) if current == expected => {
                self.entries.invalidate(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
