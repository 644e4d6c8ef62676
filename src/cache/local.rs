//! Tier L0: in-process, capacity-bounded cache.
//!
//! Eviction is by **creation order**: inserting a new key at capacity removes the entry with
//! the oldest `created_at`, no matter how recently it was read. Hit counts are recorded but
//! do not influence eviction.
//!
//! Three clocks apply (see [`LocalCacheConfig`]): a read-path freshness window, the sweep
//! interval, and the sweep horizon.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use super::types::CacheEntry;
use crate::constants::{
    DEFAULT_LOCAL_CAPACITY, DEFAULT_LOCAL_FRESHNESS_SECS, DEFAULT_SWEEP_HORIZON_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCacheConfig {
    /// Max entries. Default: `100`.
    pub capacity: usize,
    /// Max age at which a stored entry is still served by `get`. Default: 30s.
    pub freshness: Duration,
    /// Period of the background sweep. Default: 5m.
    pub sweep_interval: Duration,
    /// Entries older than this are dropped by the sweep. Default: 30m.
    pub sweep_horizon: Duration,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOCAL_CAPACITY,
            freshness: Duration::from_secs(DEFAULT_LOCAL_FRESHNESS_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_horizon: Duration::from_secs(DEFAULT_SWEEP_HORIZON_SECS),
        }
    }
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    // Tie-breaker for entries created within the same clock tick.
    seq: u64,
}

#[derive(Debug, Default)]
struct Slots {
    map: HashMap<String, Slot>,
    next_seq: u64,
}

impl Slots {
    fn evict_oldest(&mut self) -> Option<String> {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, slot)| (slot.entry.created_at, slot.seq))
            .map(|(key, _)| key.clone())?;
        self.map.remove(&victim);
        Some(victim)
    }
}

#[derive(Debug, Default)]
struct SweeperState {
    running: bool,
    // Bumped on every stop; a task exits once it no longer matches.
    generation: u64,
}

pub struct LocalCache {
    slots: Mutex<Slots>,
    config: LocalCacheConfig,
    hits: AtomicU64,
    sweeper: Mutex<SweeperState>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::with_config(LocalCacheConfig::default())
    }

    /// Creates a cache with the given config.
    ///
    /// A zero capacity is raised to one and a zero sweep interval falls back to the default.
    pub fn with_config(config: LocalCacheConfig) -> Self {
        let sweep_interval = if config.sweep_interval.is_zero() {
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)
        } else {
            config.sweep_interval
        };
        let config = LocalCacheConfig {
            capacity: config.capacity.max(1),
            sweep_interval,
            ..config
        };
        Self {
            slots: Mutex::new(Slots::default()),
            config,
            hits: AtomicU64::new(0),
            sweeper: Mutex::new(SweeperState::default()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(LocalCacheConfig {
            capacity,
            ..LocalCacheConfig::default()
        })
    }

    #[inline]
    pub fn config(&self) -> &LocalCacheConfig {
        &self.config
    }

    /// Returns a fresh entry and records the hit. Stale entries are dropped and read as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut slots = self.slots.lock();
        let fresh = slots
            .map
            .get(key)
            .map(|slot| !slot.entry.is_older_than(self.config.freshness))?;

        if !fresh {
            slots.map.remove(key);
            debug!(key, "L0 entry past freshness window");
            return None;
        }

        let slot = slots.map.get_mut(key)?;
        slot.entry.hit_count += 1;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(slot.entry.clone())
    }

    /// Inserts or replaces `key`. A new key at capacity evicts the oldest-created entry first.
    pub fn insert(&self, key: &str, entry: CacheEntry) {
        let mut slots = self.slots.lock();
        if !slots.map.contains_key(key) && slots.map.len() >= self.config.capacity {
            if let Some(victim) = slots.evict_oldest() {
                debug!(evicted = %victim, "L0 at capacity, evicted oldest entry");
            }
        }

        let seq = slots.next_seq;
        slots.next_seq += 1;
        slots.map.insert(key.to_string(), Slot { entry, seq });
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.slots.lock().map.remove(key).map(|slot| slot.entry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.lock().map.contains_key(key)
    }

    /// Removes every key containing `substring`. Returns the number removed.
    pub fn invalidate_matching(&self, substring: &str) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.map.len();
        slots.map.retain(|key, _| !key.contains(substring));
        before - slots.map.len()
    }

    /// Drops every entry older than the sweep horizon, regardless of its pattern TTL.
    pub fn sweep(&self) -> usize {
        let horizon = self.config.sweep_horizon;
        let mut slots = self.slots.lock();
        let before = slots.map.len();
        slots.map.retain(|_, slot| !slot.entry.is_older_than(horizon));
        before - slots.map.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().map.is_empty()
    }

    pub fn clear(&self) {
        self.slots.lock().map.clear();
    }

    /// Total hits served since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Current keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.slots.lock().map.keys().cloned().collect()
    }

    /// Starts the periodic sweep (no-op if already running).
    ///
    /// The task holds only a weak reference and exits once the cache is dropped or
    /// [`stop_sweeper`](Self::stop_sweeper) is called.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let generation = {
            let mut sweeper = self.sweeper.lock();
            if sweeper.running {
                return tokio::spawn(async {});
            }
            sweeper.running = true;
            sweeper.generation
        };

        let cache = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                if cache.sweeper.lock().generation != generation {
                    break;
                }
                let removed = cache.sweep();
                if removed > 0 {
                    info!(removed, remaining = cache.len(), "L0 sweep");
                }
            }
        })
    }

    /// Signals the sweeper to exit at its next tick.
    pub fn stop_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        sweeper.running = false;
        sweeper.generation += 1;
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper.lock().running
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.len())
            .field("capacity", &self.config.capacity)
            .field("hits", &self.hits())
            .finish()
    }
}
