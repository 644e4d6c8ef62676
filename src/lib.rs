//! Stratum library crate: a tiered cache and a distributed lock.
//!
//! # Public API Surface
//!
//! ## Tiered cache
//! - [`TieredCache`] - facade over L0 local, L1 memory, L2 remote and optional L3 tiers
//! - [`PatternTable`], [`PatternConfig`] - key-pattern → TTL / strategy / tier resolution
//! - [`LocalCache`] - the bounded, creation-order L0 tier
//! - [`cached`] - explicit read-through memoization helper
//!
//! ## Named caches
//! - [`LruRegistry`] - independent recency-based LRU caches keyed by name
//!
//! ## Locks
//! - [`LockManager`] - token-based mutual exclusion over the shared store
//!
//! ## Stores
//! - [`KeyValueStore`] - trait implemented by [`RedisStore`] and [`MemoryStore`]
//! - [`BackingStoreClient`] - wraps a store and turns every failure into a logged miss/no-op
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod hashing;
pub mod lock;
pub mod registry;
pub mod store;

#[cfg(any(test, feature = "mock"))]
pub use cache::MockTiers;
pub use cache::{
    CacheEntry, CacheOptions, CacheStats, LocalCache, LocalCacheConfig, PatternConfig,
    PatternSpec, PatternTable, Strategy, TierId, TieredCache, TieredCacheBuilder,
    TieredLookupResult, cached,
};
pub use config::{Config, ConfigError};
pub use hashing::{content_key, hash_bytes, hash_parts};
pub use lock::{LockHandle, LockManager, LockOptions, LockOutcome};
pub use registry::{LruOptions, LruRegistry, NamedCache};
#[cfg(any(test, feature = "mock"))]
pub use store::MockStore;
pub use store::{
    BackingStoreClient, KeyValueStore, MemoryStore, RedisStore, RedisStoreConfig, StoreError,
    StoreResult,
};
