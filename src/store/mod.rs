//! Backing stores for the L1/L2/L3 tiers and the lock manager.

pub mod client;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod redis_store;


pub use client::{BackingStoreClient, KeyValueStore};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
