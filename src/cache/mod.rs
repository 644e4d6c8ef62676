//! Tiered cache: pattern resolution, the L0 local tier and the orchestrator.

pub mod local;
pub mod memoize;
pub mod pattern;
pub mod tiered;
pub mod types;

#[cfg(test)]
mod tiered_tests;

pub use local::{LocalCache, LocalCacheConfig};
pub use memoize::cached;
pub use pattern::{PatternConfig, PatternSpec, PatternTable};
#[cfg(any(test, feature = "mock"))]
pub use tiered::MockTiers;
pub use tiered::{TieredCache, TieredCacheBuilder, TieredLookupResult};
pub use types::{CacheEntry, CacheOptions, CacheStats, Strategy, TierId};
