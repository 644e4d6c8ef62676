use std::future::Future;
use std::sync::Arc;

use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{LockHandle, LockOptions, LockOutcome, lock_store_key};
use crate::store::{BackingStoreClient, KeyValueStore};

/// Distributed mutual exclusion over a shared [`KeyValueStore`].
///
/// A lock is a `lock:{key}` entry holding a random token, created only if absent and expiring
/// after the lock TTL. Release deletes the entry only while it still holds the caller's token,
/// so a holder whose lock already expired cannot remove a newer holder's lock.
#[derive(Debug, Clone)]
pub struct LockManager {
    store: BackingStoreClient,
    defaults: LockOptions,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_defaults(store, LockOptions::default())
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>, defaults: LockOptions) -> Self {
        Self {
            store: BackingStoreClient::new("LOCK", store),
            defaults,
        }
    }

    pub fn defaults(&self) -> &LockOptions {
        &self.defaults
    }

    /// Single create-if-absent attempt.
    pub async fn try_acquire(&self, key: &str, options: &LockOptions) -> Option<LockHandle> {
        let token = Uuid::new_v4().to_string();
        let store_key = lock_store_key(key);

        if self
            .store
            .set_if_absent(&store_key, &token, options.ttl)
            .await
        {
            debug!(key, ttl_ms = options.ttl.as_millis() as u64, "lock acquired");
            Some(LockHandle {
                key: key.to_string(),
                token,
                ttl: options.ttl,
            })
        } else {
            None
        }
    }

    /// Tries up to `max_retries` times (at least once), sleeping `retry_delay` between attempts.
    ///
    /// A store outage reads as contention.
    pub async fn acquire(&self, key: &str, options: &LockOptions) -> Option<LockHandle> {
        let attempts = options.max_retries.max(1);
        for attempt in 1..=attempts {
            if let Some(handle) = self.try_acquire(key, options).await {
                return Some(handle);
            }
            if attempt < attempts {
                time::sleep(options.retry_delay).await;
            }
        }

        debug!(key, attempts, "lock contended");
        None
    }

    /// [`acquire`](Self::acquire) with this manager's default options.
    pub async fn acquire_default(&self, key: &str) -> Option<LockHandle> {
        self.acquire(key, &self.defaults).await
    }

    /// Deletes the lock entry only if it still holds `handle.token`. Returns `true` if deleted.
    pub async fn release(&self, handle: &LockHandle) -> bool {
        let released = self
            .store
            .delete_if_equals(&handle.store_key(), &handle.token)
            .await;
        if released {
            debug!(key = %handle.key, "lock released");
        } else {
            warn!(key = %handle.key, "lock was not held by this token at release (expired or taken over)");
        }
        released
    }

    /// Returns `true` if some holder currently owns `key`.
    pub async fn is_locked(&self, key: &str) -> bool {
        self.store.get(&lock_store_key(key)).await.is_some()
    }

    /// Runs `f` while holding the lock on `key`.
    ///
    /// The lock is released on every exit path: normal completion, a panic inside `f`, or the
    /// returned future being dropped mid-flight. Returns [`LockOutcome::Contended`] if the lock
    /// could not be acquired within `options.max_retries` attempts.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, f: F, options: &LockOptions) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(handle) = self.acquire(key, options).await else {
            return LockOutcome::Contended;
        };

        let mut guard = ReleaseGuard {
            manager: self.clone(),
            handle: Some(handle),
        };
        let value = f().await;
        guard.release().await;

        LockOutcome::Acquired(value)
    }
}

/// Releases the held lock when dropped without an explicit release.
struct ReleaseGuard {
    manager: LockManager,
    handle: Option<LockHandle>,
}

impl ReleaseGuard {
    async fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.manager.release(&handle).await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let manager = self.manager.clone();
                runtime.spawn(async move {
                    manager.release(&handle).await;
                });
            }
            Err(_) => {
                warn!(key = %handle.key, "no runtime to release lock; it will expire after its TTL");
            }
        }
    }
}
