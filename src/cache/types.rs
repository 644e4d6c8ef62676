use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage tiers, declared fastest first. The derived `Ord` is the speed ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TierId {
    #[serde(rename = "l0", alias = "local")]
    L0Local,
    #[serde(rename = "l1", alias = "memory")]
    L1Memory,
    #[serde(rename = "l2", alias = "remote")]
    L2Remote,
    #[serde(rename = "l3", alias = "database")]
    L3Database,
}

impl TierId {
    pub const ALL: [TierId; 4] = [
        TierId::L0Local,
        TierId::L1Memory,
        TierId::L2Remote,
        TierId::L3Database,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::L0Local => "L0_LOCAL",
            TierId::L1Memory => "L1_MEMORY",
            TierId::L2Remote => "L2_REMOTE",
            TierId::L3Database => "L3_DATABASE",
        }
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory strategy label recorded on each entry.
///
/// The orchestrator does not dispatch on it; read and write paths are identical for every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    SemanticDedup,
    ExactMatch,
    ContentHash,
    SlidingWindow,
    RefreshAhead,
    SimilarityThreshold,
    /// Written when a slower-tier hit is copied into a faster tier.
    Propagated,
}

impl Strategy {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SemanticDedup => "semantic-dedup",
            Strategy::ExactMatch => "exact-match",
            Strategy::ContentHash => "content-hash",
            Strategy::SlidingWindow => "sliding-window",
            Strategy::RefreshAhead => "refresh-ahead",
            Strategy::SimilarityThreshold => "similarity-threshold",
            Strategy::Propagated => "propagated",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached value plus bookkeeping. Serialized as JSON in the L1/L2/L3 tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Only incremented by the local tier.
    #[serde(default)]
    pub hit_count: u64,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CacheEntry {
    pub fn new(data: serde_json::Value, strategy: Strategy) -> Self {
        Self {
            data,
            created_at: Utc::now(),
            hit_count: 0,
            strategy,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Time since creation. Clock skew that puts `created_at` in the future reads as zero.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    #[inline]
    pub fn is_older_than(&self, horizon: Duration) -> bool {
        self.age() >= horizon
    }
}

/// Per-call overrides. Unset fields fall through to the key's pattern, then the global default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Option<Duration>,
    pub strategy: Option<Strategy>,
    pub tiers: Option<Vec<TierId>>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn tiers(mut self, tiers: impl Into<Vec<TierId>>) -> Self {
        self.tiers = Some(tiers.into());
        self
    }
}

/// Cheap introspection snapshot returned by [`TieredCache::stats`](super::TieredCache::stats).
///
/// Per-pattern hit/miss counts are not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub local_size: usize,
    pub local_hits: u64,
    pub backing_reachable: bool,
}
