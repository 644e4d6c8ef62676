//! Explicit read-through memoization over a [`TieredCache`].

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::tiered::TieredCache;
use super::types::CacheOptions;

/// Returns the cached value for the key produced by `key_fn`, or runs `compute` and caches
/// its `Ok` result.
///
/// Errors from `compute` are returned as-is and never cached. Concurrent misses on the same
/// key may each run `compute`.
///
/// ```no_run
/// # use stratum::cache::{CacheOptions, TieredCache, cached};
/// # use stratum::hashing::content_key;
/// # async fn transcribe(_: &[u8]) -> Result<String, std::io::Error> { Ok(String::new()) }
/// # async fn demo(cache: &TieredCache, audio: &[u8]) -> Result<String, std::io::Error> {
/// let text = cached(
///     cache,
///     || content_key("voice-transcripts", [audio]),
///     &CacheOptions::default(),
///     || transcribe(audio),
/// )
/// .await?;
/// # Ok(text)
/// # }
/// ```
pub async fn cached<T, E, K, F, Fut>(
    cache: &TieredCache,
    key_fn: K,
    options: &CacheOptions,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    K: FnOnce() -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key = key_fn();
    if let Some(value) = cache.get::<T>(&key, options).await {
        return Ok(value);
    }

    debug!(key = %key, "memoized call missed, computing");
    let value = compute().await?;
    cache.set(&key, &value, options).await;
    Ok(value)
}
