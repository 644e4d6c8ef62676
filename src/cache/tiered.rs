//! Tiered cache: L0 local → L1 memory → L2 remote → L3 database.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use super::local::{LocalCache, LocalCacheConfig};
use super::pattern::PatternTable;
use super::types::{CacheEntry, CacheOptions, CacheStats, Strategy, TierId};
use crate::config::Config;
use crate::constants::DEFAULT_PROPAGATION_TTL_SECS;
#[cfg(any(test, feature = "mock"))]
use crate::store::MockStore;
use crate::store::{BackingStoreClient, KeyValueStore, MemoryStore, RedisStore, StoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TieredLookupResult {
    Hit { tier: TierId, entry: CacheEntry },
    Miss,
}

impl TieredLookupResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, TieredLookupResult::Hit { .. })
    }

    /// Tier that served the hit.
    pub fn tier(&self) -> Option<TierId> {
        match self {
            TieredLookupResult::Hit { tier, .. } => Some(*tier),
            TieredLookupResult::Miss => None,
        }
    }

    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            TieredLookupResult::Hit { entry, .. } => Some(entry),
            TieredLookupResult::Miss => None,
        }
    }
}

/// Facade over all tiers. Resolves each key's [`PatternConfig`](super::PatternConfig), reads
/// tiers fastest first, propagates hits upward and fans writes out.
///
/// No operation returns an error: tier failures are logged by [`BackingStoreClient`] and
/// degrade to misses or skipped writes.
pub struct TieredCache {
    patterns: Arc<PatternTable>,
    local: Arc<LocalCache>,
    memory: BackingStoreClient,
    remote: BackingStoreClient,
    database: Option<BackingStoreClient>,
    propagation_ttl: Duration,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.local)
            .field("memory", &self.memory)
            .field("remote", &self.remote)
            .field("database", &self.database)
            .field("propagation_ttl", &self.propagation_ttl)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Starts a builder. `remote` backs the L2 tier (and the lock manager, usually).
    pub fn builder(remote: Arc<dyn KeyValueStore>) -> TieredCacheBuilder {
        TieredCacheBuilder::new(remote)
    }

    /// Production wiring: L0 local, L1 in-process memory store, L2 Redis, no L3.
    pub fn from_config(config: &Config, patterns: PatternTable) -> StoreResult<Self> {
        let redis = RedisStore::connect(&config.redis_store_config())?;
        Ok(Self::builder(Arc::new(redis))
            .patterns(patterns)
            .local_config(config.local_cache_config())
            .memory_store(Arc::new(MemoryStore::with_capacity(config.memory_capacity)))
            .propagation_ttl(config.propagation_ttl)
            .build())
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    pub fn local(&self) -> &Arc<LocalCache> {
        &self.local
    }

    pub fn remote(&self) -> &BackingStoreClient {
        &self.remote
    }

    pub fn propagation_ttl(&self) -> Duration {
        self.propagation_ttl
    }

    /// Client behind a remote tier. `None` for L0 and for an unconfigured L3.
    pub fn client(&self, tier: TierId) -> Option<&BackingStoreClient> {
        match tier {
            TierId::L0Local => None,
            TierId::L1Memory => Some(&self.memory),
            TierId::L2Remote => Some(&self.remote),
            TierId::L3Database => self.database.as_ref(),
        }
    }

    /// Returns `true` when L1 and L2 resolve to the same physical store.
    pub fn memory_collapsed_onto_remote(&self) -> bool {
        self.memory.shares_store_with(&self.remote)
    }

    /// Reads the key's configured tiers fastest first and propagates a hit into every
    /// configured tier faster than the one that served it.
    #[instrument(skip(self, options), fields(key = key))]
    pub async fn lookup(&self, key: &str, options: &CacheOptions) -> TieredLookupResult {
        let config = self.patterns.resolve(key, options);

        for (idx, &tier) in config.tiers.iter().enumerate() {
            let Some(entry) = self.read_tier(tier, key).await else {
                continue;
            };

            debug!(tier = %tier, "cache hit");
            let faster = &config.tiers[..idx];
            if !faster.is_empty() {
                self.propagate(key, &entry, faster).await;
            }
            return TieredLookupResult::Hit { tier, entry };
        }

        debug!(tiers = ?config.tiers, "cache miss");
        TieredLookupResult::Miss
    }

    /// Returns the cached value for `key`, or `None` on a miss.
    ///
    /// A hit whose payload does not decode into `T` is logged and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        let (tier, entry) = match self.lookup(key, options).await {
            TieredLookupResult::Hit { tier, entry } => (tier, entry),
            TieredLookupResult::Miss => return None,
        };

        match serde_json::from_value(entry.data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, tier = %tier, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Writes `value` to every configured tier concurrently.
    ///
    /// Always returns normally, even if every tier write fails. Callers that need durability
    /// must verify it themselves.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: &CacheOptions) {
        self.store(key, value, None, options).await;
    }

    /// Like [`set`](Self::set), recording `metadata` on the entry.
    pub async fn set_with_metadata<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        metadata: BTreeMap<String, String>,
        options: &CacheOptions,
    ) {
        self.store(key, value, Some(metadata), options).await;
    }

    #[instrument(skip(self, value, metadata, options), fields(key = key))]
    async fn store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        metadata: Option<BTreeMap<String, String>>,
        options: &CacheOptions,
    ) {
        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "value is not serializable, nothing cached");
                return;
            }
        };

        let config = self.patterns.resolve(key, options);
        let mut entry = CacheEntry::new(data, config.strategy);
        entry.metadata = metadata;

        let written = join_all(
            config
                .tiers
                .iter()
                .map(|&tier| self.write_tier(tier, key, &entry, config.ttl)),
        )
        .await
        .into_iter()
        .filter(|ok| *ok)
        .count();

        if written == 0 {
            warn!(tiers = ?config.tiers, "no tier accepted the write");
        } else {
            debug!(
                written,
                tiers = ?config.tiers,
                ttl_secs = config.ttl.as_secs(),
                strategy = %config.strategy,
                "cache set"
            );
        }
    }

    /// Removes `key` from all four tiers, whatever its pattern.
    #[instrument(skip(self), fields(key = key))]
    pub async fn delete(&self, key: &str) {
        join_all(TierId::ALL.iter().map(|&tier| self.delete_tier(tier, key))).await;
        debug!("cache delete");
    }

    /// Removes every L0 key containing `substring` and returns how many were removed.
    ///
    /// Remote tiers are **not** scanned. Matching entries in L1/L2/L3 stay readable until their
    /// own TTL lapses, so a later [`get`](Self::get) may still observe them.
    pub fn invalidate_pattern(&self, substring: &str) -> usize {
        let removed = self.local.invalidate_matching(substring);
        info!(substring, removed, "invalidated local entries (remote tiers untouched)");
        removed
    }

    /// Local size, local hits, and whether the L2 store answers a ping.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            local_size: self.local.len(),
            local_hits: self.local.hits(),
            backing_reachable: self.remote.is_reachable().await,
        }
    }

    /// Starts the L0 periodic sweep.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.local.start_sweeper()
    }

    async fn propagate(&self, key: &str, hit: &CacheEntry, tiers: &[TierId]) {
        let mut entry = CacheEntry::new(hit.data.clone(), Strategy::Propagated);
        entry.metadata = hit.metadata.clone();

        join_all(
            tiers
                .iter()
                .map(|&tier| self.write_tier(tier, key, &entry, self.propagation_ttl)),
        )
        .await;
        debug!(tiers = ?tiers, "propagated hit to faster tiers");
    }

    async fn read_tier(&self, tier: TierId, key: &str) -> Option<CacheEntry> {
        match tier {
            TierId::L0Local => self.local.get(key),
            _ => self.client(tier)?.get_entry(key).await,
        }
    }

    async fn write_tier(&self, tier: TierId, key: &str, entry: &CacheEntry, ttl: Duration) -> bool {
        match tier {
            TierId::L0Local => {
                self.local.insert(key, entry.clone());
                true
            }
            _ => match self.client(tier) {
                Some(client) => client.set_entry(key, entry, ttl).await,
                None => {
                    debug!(tier = %tier, key, "tier not configured, write skipped");
                    false
                }
            },
        }
    }

    async fn delete_tier(&self, tier: TierId, key: &str) -> bool {
        match tier {
            TierId::L0Local => self.local.remove(key).is_some(),
            _ => match self.client(tier) {
                Some(client) => client.delete(key).await,
                None => false,
            },
        }
    }
}

/// Builder for [`TieredCache`].
pub struct TieredCacheBuilder {
    patterns: PatternTable,
    local: LocalCacheConfig,
    memory: Option<Arc<dyn KeyValueStore>>,
    remote: Arc<dyn KeyValueStore>,
    database: Option<Arc<dyn KeyValueStore>>,
    propagation_ttl: Duration,
    collapse_memory: bool,
}

impl TieredCacheBuilder {
    fn new(remote: Arc<dyn KeyValueStore>) -> Self {
        Self {
            patterns: PatternTable::builtin(),
            local: LocalCacheConfig::default(),
            memory: None,
            remote,
            database: None,
            propagation_ttl: Duration::from_secs(DEFAULT_PROPAGATION_TTL_SECS),
            collapse_memory: false,
        }
    }

    pub fn patterns(mut self, patterns: PatternTable) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn local_config(mut self, config: LocalCacheConfig) -> Self {
        self.local = config;
        self
    }

    /// Store for the L1 tier. Defaults to a fresh [`MemoryStore`].
    pub fn memory_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.memory = Some(store);
        self
    }

    /// Store for the L3 tier. Without one, L3 reads miss and writes are skipped.
    pub fn database_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.database = Some(store);
        self
    }

    pub fn propagation_ttl(mut self, ttl: Duration) -> Self {
        self.propagation_ttl = ttl;
        self
    }

    /// Serve L1 from the remote store, so the two logical tiers share one physical store.
    pub fn collapse_memory_onto_remote(mut self) -> Self {
        self.collapse_memory = true;
        self
    }

    pub fn build(self) -> TieredCache {
        let memory = if self.collapse_memory {
            Arc::clone(&self.remote)
        } else {
            self.memory
                .unwrap_or_else(|| Arc::new(MemoryStore::default()))
        };

        TieredCache {
            patterns: Arc::new(self.patterns),
            local: Arc::new(LocalCache::with_config(self.local)),
            memory: BackingStoreClient::new(TierId::L1Memory.as_str(), memory),
            remote: BackingStoreClient::new(TierId::L2Remote.as_str(), self.remote),
            database: self
                .database
                .map(|store| BackingStoreClient::new(TierId::L3Database.as_str(), store)),
            propagation_ttl: self.propagation_ttl,
        }
    }
}

/// Mock stores behind a [`TieredCache::new_mock`] instance.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone)]
pub struct MockTiers {
    pub memory: Arc<MockStore>,
    pub remote: Arc<MockStore>,
    pub database: Arc<MockStore>,
}

#[cfg(any(test, feature = "mock"))]
impl TieredCache {
    pub fn new_mock() -> (Self, MockTiers) {
        Self::new_mock_with(LocalCacheConfig::default(), PatternTable::builtin())
    }

    pub fn new_mock_with(local: LocalCacheConfig, patterns: PatternTable) -> (Self, MockTiers) {
        let tiers = MockTiers {
            memory: Arc::new(MockStore::new("mock-memory")),
            remote: Arc::new(MockStore::new("mock-remote")),
            database: Arc::new(MockStore::new("mock-database")),
        };

        let cache = Self::builder(tiers.remote.clone())
            .patterns(patterns)
            .local_config(local)
            .memory_store(tiers.memory.clone())
            .database_store(tiers.database.clone())
            .build();

        (cache, tiers)
    }
}
