use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::local::LocalCacheConfig;
use super::memoize::cached;
use super::pattern::PatternTable;
use super::tiered::{TieredCache, TieredLookupResult};
use super::types::{CacheOptions, Strategy, TierId};
use crate::store::{KeyValueStore, MemoryStore, MockStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Answer {
    text: String,
    tokens: u32,
}

fn answer() -> Answer {
    Answer {
        text: "Rust is a systems language".to_string(),
        tokens: 6,
    }
}

#[tokio::test]
async fn test_set_writes_only_configured_tiers() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "ai-responses:user123:abc";

    cache.set(key, &answer(), &CacheOptions::default()).await;

    assert_eq!(mocks.memory.write_calls(), 1);
    assert_eq!(mocks.remote.write_calls(), 1);
    assert_eq!(mocks.database.write_calls(), 0);
    assert!(cache.local().is_empty());
}

#[tokio::test]
async fn test_get_hits_fastest_configured_tier() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "ai-responses:user123:abc";
    cache.set(key, &answer(), &CacheOptions::default()).await;

    let result = cache.lookup(key, &CacheOptions::default()).await;
    assert_eq!(result.tier(), Some(TierId::L1Memory));

    let entry = result.into_entry().unwrap();
    assert_eq!(entry.strategy, Strategy::SemanticDedup);
    assert_eq!(mocks.remote.get_calls(), 0);

    let value: Answer = cache.get(key, &CacheOptions::default()).await.unwrap();
    assert_eq!(value, answer());
}

#[tokio::test]
async fn test_remote_entry_is_json_with_strategy() {
    let (cache, mocks) = TieredCache::new_mock();
    cache
        .set("voice-transcripts:1", "hello", &CacheOptions::default())
        .await;

    let raw = mocks.remote.peek("voice-transcripts:1").await.unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["data"], "hello");
    assert_eq!(stored["strategy"], "exact-match");
}

#[tokio::test]
async fn test_delete_reaches_all_four_tiers() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "ai-responses:user123:abc";
    cache.set(key, &answer(), &CacheOptions::default()).await;

    cache.delete(key).await;

    assert_eq!(mocks.memory.delete_calls(), 1);
    assert_eq!(mocks.remote.delete_calls(), 1);
    assert_eq!(mocks.database.delete_calls(), 1);
    assert!(cache.get::<Answer>(key, &CacheOptions::default()).await.is_none());
}

#[tokio::test]
async fn test_slower_hit_propagates_to_faster_tiers() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "integration-data:crm:42";

    cache
        .set(key, &answer(), &CacheOptions::new().tiers([TierId::L2Remote]))
        .await;
    assert!(mocks.memory.peek(key).await.is_none());

    let first = cache.lookup(key, &CacheOptions::default()).await;
    assert_eq!(first.tier(), Some(TierId::L2Remote));

    let local = cache.local().get(key).expect("propagated into L0");
    assert_eq!(local.strategy, Strategy::Propagated);

    let raw = mocks.memory.peek(key).await.expect("propagated into L1");
    assert!(raw.contains("propagated"));

    let second = cache.lookup(key, &CacheOptions::default()).await;
    assert_eq!(second.tier(), Some(TierId::L0Local));
}

#[tokio::test]
async fn test_hit_in_fastest_tier_does_not_write() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "ai-responses:1";
    cache.set(key, &answer(), &CacheOptions::default()).await;
    let writes = mocks.memory.write_calls() + mocks.remote.write_calls();

    cache.lookup(key, &CacheOptions::default()).await;

    assert_eq!(mocks.memory.write_calls() + mocks.remote.write_calls(), writes);
}

#[tokio::test]
async fn test_propagation_stays_within_configured_tiers() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "ai-responses:2";
    cache
        .set(key, &answer(), &CacheOptions::new().tiers([TierId::L2Remote]))
        .await;

    let result = cache.lookup(key, &CacheOptions::default()).await;

    assert_eq!(result.tier(), Some(TierId::L2Remote));
    assert!(mocks.memory.peek(key).await.is_some());
    // ai-responses does not use L0.
    assert!(!cache.local().contains(key));
}

#[tokio::test]
async fn test_miss_returns_none() {
    let (cache, _mocks) = TieredCache::new_mock();

    let result = cache.lookup("ai-responses:missing", &CacheOptions::default()).await;

    assert_eq!(result, TieredLookupResult::Miss);
    assert!(!result.is_hit());
}

#[tokio::test]
async fn test_get_with_wrong_type_is_a_miss() {
    let (cache, _mocks) = TieredCache::new_mock();
    cache
        .set("ai-responses:3", "just a string", &CacheOptions::default())
        .await;

    assert!(
        cache
            .get::<Answer>("ai-responses:3", &CacheOptions::default())
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_invalidate_pattern_is_local_only() {
    let (cache, _mocks) = TieredCache::new_mock();
    cache
        .set("user-context:alice", &answer(), &CacheOptions::default())
        .await;
    cache
        .set("user-context:bob", &answer(), &CacheOptions::default())
        .await;
    assert_eq!(cache.local().len(), 2);

    let removed = cache.invalidate_pattern("user-context");
    assert_eq!(removed, 2);
    assert!(cache.local().is_empty());

    // L1 still holds the entry and serves it.
    let result = cache
        .lookup("user-context:alice", &CacheOptions::default())
        .await;
    assert_eq!(result.tier(), Some(TierId::L1Memory));
}

#[tokio::test]
async fn test_remote_outage_degrades_to_other_tiers() {
    let (cache, mocks) = TieredCache::new_mock();
    mocks.remote.set_unavailable(true);
    let key = "ai-responses:4";

    cache.set(key, &answer(), &CacheOptions::default()).await;
    let value: Option<Answer> = cache.get(key, &CacheOptions::default()).await;

    assert_eq!(value, Some(answer()));
    assert!(!cache.stats().await.backing_reachable);
}

#[tokio::test]
async fn test_total_outage_reads_as_miss() {
    let (cache, mocks) = TieredCache::new_mock();
    mocks.memory.set_unavailable(true);
    mocks.remote.set_unavailable(true);
    let key = "ai-responses:5";

    cache.set(key, &answer(), &CacheOptions::default()).await;
    cache.delete(key).await;

    assert!(cache.get::<Answer>(key, &CacheOptions::default()).await.is_none());
}

#[tokio::test]
async fn test_database_tier_when_requested() {
    let (cache, mocks) = TieredCache::new_mock();
    let key = "reports:q3";
    let opts = CacheOptions::new().tiers([TierId::L3Database]);

    cache.set(key, &answer(), &opts).await;
    assert_eq!(mocks.database.write_calls(), 1);

    let result = cache.lookup(key, &opts).await;
    assert_eq!(result.tier(), Some(TierId::L3Database));
}

#[tokio::test]
async fn test_unconfigured_database_tier_is_skipped() {
    let cache = TieredCache::builder(Arc::new(MemoryStore::default())).build();
    let opts = CacheOptions::new().tiers([TierId::L3Database]);

    cache.set("reports:q3", &answer(), &opts).await;

    assert!(cache.client(TierId::L3Database).is_none());
    assert!(!cache.lookup("reports:q3", &opts).await.is_hit());
}

#[tokio::test]
async fn test_set_with_metadata_roundtrips() {
    let (cache, _mocks) = TieredCache::new_mock();
    let mut metadata = BTreeMap::new();
    metadata.insert("model".to_string(), "small".to_string());

    cache
        .set_with_metadata("ai-responses:6", &answer(), metadata.clone(), &CacheOptions::default())
        .await;

    let entry = cache
        .lookup("ai-responses:6", &CacheOptions::default())
        .await
        .into_entry()
        .unwrap();
    assert_eq!(entry.metadata, Some(metadata));
}

#[tokio::test]
async fn test_stats_reports_local_state() {
    let (cache, _mocks) = TieredCache::new_mock();
    cache
        .set("user-context:1", &answer(), &CacheOptions::default())
        .await;
    cache
        .lookup("user-context:1", &CacheOptions::default())
        .await;

    let stats = cache.stats().await;
    assert_eq!(stats.local_size, 1);
    assert_eq!(stats.local_hits, 1);
    assert!(stats.backing_reachable);
}

#[tokio::test]
async fn test_custom_local_config_and_patterns() {
    let patterns = PatternTable::from_json_str(
        r#"[{"name": "thumbs", "ttl_secs": 60, "strategy": "content-hash", "tiers": ["l0"]}]"#,
    )
    .unwrap();
    let (cache, mocks) = TieredCache::new_mock_with(
        LocalCacheConfig {
            capacity: 2,
            ..LocalCacheConfig::default()
        },
        patterns,
    );

    for i in 0..3 {
        cache
            .set(&format!("thumbs:{}", i), &i, &CacheOptions::default())
            .await;
    }

    assert_eq!(cache.local().len(), 2);
    assert!(!cache.local().contains("thumbs:0"));
    assert_eq!(mocks.memory.write_calls(), 0);
}

#[test]
fn test_collapse_memory_onto_remote() {
    let remote: Arc<dyn KeyValueStore> = Arc::new(MockStore::new("shared"));

    let collapsed = TieredCache::builder(Arc::clone(&remote))
        .collapse_memory_onto_remote()
        .build();
    let split = TieredCache::builder(remote).build();

    assert!(collapsed.memory_collapsed_onto_remote());
    assert!(!split.memory_collapsed_onto_remote());
}

#[tokio::test]
async fn test_collapsed_tiers_share_entries() {
    let remote = Arc::new(MockStore::new("shared"));
    let cache = TieredCache::builder(remote.clone())
        .collapse_memory_onto_remote()
        .build();

    cache
        .set("ai-responses:7", &answer(), &CacheOptions::new().tiers([TierId::L2Remote]))
        .await;

    let result = cache.lookup("ai-responses:7", &CacheOptions::default()).await;
    assert_eq!(result.tier(), Some(TierId::L1Memory));
}

#[tokio::test]
async fn test_propagation_ttl_is_configurable() {
    let cache = TieredCache::builder(Arc::new(MemoryStore::default()))
        .propagation_ttl(Duration::from_secs(5))
        .build();

    assert_eq!(cache.propagation_ttl(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_cached_computes_once() {
    let (cache, _mocks) = TieredCache::new_mock();
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    for _ in 0..3 {
        let value: Result<Answer, std::io::Error> = cached(
            &cache,
            || "ai-responses:memo".to_string(),
            &CacheOptions::default(),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(answer())
            },
        )
        .await;
        assert_eq!(value.unwrap(), answer());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_does_not_store_errors() {
    let (cache, _mocks) = TieredCache::new_mock();

    let failed: Result<Answer, String> = cached(
        &cache,
        || "ai-responses:flaky".to_string(),
        &CacheOptions::default(),
        || async { Err("upstream timeout".to_string()) },
    )
    .await;
    assert!(failed.is_err());

    let recovered: Result<Answer, String> = cached(
        &cache,
        || "ai-responses:flaky".to_string(),
        &CacheOptions::default(),
        || async { Ok(answer()) },
    )
    .await;
    assert_eq!(recovered.unwrap(), answer());
}
