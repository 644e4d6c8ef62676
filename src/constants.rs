//! Cross-cutting, shared constants.
//!
//! # L0 time horizons
//!
//! The local tier is governed by three independent clocks. None is derived from another:
//!
//! | Constant                        | Default | Governs                                   |
//! |---------------------------------|---------|-------------------------------------------|
//! | [`DEFAULT_LOCAL_FRESHNESS_SECS`] | 30s     | whether a stored L0 entry is served on read |
//! | [`DEFAULT_SWEEP_INTERVAL_SECS`]  | 5m      | how often the L0 sweeper runs              |
//! | [`DEFAULT_SWEEP_HORIZON_SECS`]   | 30m     | age past which the sweeper drops an entry  |
//! | [`DEFAULT_PROPAGATION_TTL_SECS`] | 1h      | TTL written when a hit is copied upward    |

use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

pub const DEFAULT_LOCAL_CAPACITY: usize = 100;
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

pub const DEFAULT_LOCAL_FRESHNESS_SECS: u64 = 30;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_SWEEP_HORIZON_SECS: u64 = 30 * 60;
pub const DEFAULT_PROPAGATION_TTL_SECS: u64 = 60 * 60;

/// TTL of the global default pattern.
pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

pub const DEFAULT_LOCK_TTL_MS: u64 = 10_000;
pub const DEFAULT_LOCK_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LOCK_RETRY_DELAY_MS: u64 = 100;

/// Namespace prefix for lock keys in the backing store.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Name of the fallback pattern.
pub const DEFAULT_PATTERN: &str = "default";

pub const DEFAULT_LRU_MAX_ENTRIES: u64 = 1_000;
pub const DEFAULT_LRU_TTL_SECS: u64 = 60 * 60;

#[inline]
pub const fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[inline]
pub const fn hours(n: u64) -> Duration {
    Duration::from_secs(n * 60 * 60)
}
