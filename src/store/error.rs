use thiserror::Error;

/// Errors raised by a [`KeyValueStore`](super::KeyValueStore) implementation.
///
/// These never escape [`BackingStoreClient`](super::BackingStoreClient); the client logs
/// them and degrades to a miss or a no-op.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The Redis server rejected or failed a command.
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store is unreachable (used by in-process stores and mocks).
    #[error("store '{store}' unavailable: {message}")]
    Unavailable {
        /// Store name.
        store: String,
        /// Error message.
        message: String,
    },
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
