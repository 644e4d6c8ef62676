use std::time::Duration;

use crate::constants::{
    DEFAULT_LOCK_MAX_RETRIES, DEFAULT_LOCK_RETRY_DELAY_MS, DEFAULT_LOCK_TTL_MS, LOCK_KEY_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Expiry of the lock entry in the backing store. Default: 10s.
    pub ttl: Duration,
    /// Total acquisition attempts (at least one is always made). Default: `3`.
    pub max_retries: u32,
    /// Fixed delay between attempts. Default: 100ms.
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(DEFAULT_LOCK_TTL_MS),
            max_retries: DEFAULT_LOCK_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_LOCK_RETRY_DELAY_MS),
        }
    }
}

impl LockOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Worst-case time spent waiting between attempts before giving up.
    pub fn max_wait(&self) -> Duration {
        self.retry_delay * self.max_retries.max(1).saturating_sub(1)
    }
}

/// Proof of acquisition. Release requires the token it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub key: String,
    pub token: String,
    pub ttl: Duration,
}

impl LockHandle {
    /// Key under which the token is stored in the backing store.
    pub fn store_key(&self) -> String {
        lock_store_key(&self.key)
    }
}

#[inline]
pub(crate) fn lock_store_key(key: &str) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, key)
}

/// Result of [`LockManager::with_lock`](super::LockManager::with_lock).
///
/// Keeps "the lock was held elsewhere" distinct from whatever the protected closure returns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum LockOutcome<T> {
    Acquired(T),
    Contended,
}

impl<T> LockOutcome<T> {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired(_))
    }

    pub fn is_contended(&self) -> bool {
        matches!(self, LockOutcome::Contended)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            LockOutcome::Acquired(value) => Some(value),
            LockOutcome::Contended => None,
        }
    }
}
