use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::client::KeyValueStore;
use super::error::{StoreError, StoreResult};
use super::memory::MemoryStore;

/// In-memory store with a switchable outage, for exercising degradation paths.
#[derive(Debug)]
pub struct MockStore {
    name: String,
    inner: MemoryStore,
    unavailable: AtomicBool,
    gets: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MockStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: MemoryStore::with_capacity(10_000),
            unavailable: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Reads straight from the backing memory, bypassing the outage switch and counters.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.ok().flatten()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                store: self.name.clone(),
                message: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete_if_equals(key, expected).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}
