//! Stratum deployment check: validates config and patterns, then exercises the cache and
//! lock against the configured stores.

use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;

use stratum::config::Config;
use stratum::lock::LockManager;
use stratum::store::KeyValueStore;
use stratum::{CacheOptions, PatternTable, TierId, TieredCache};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const CHECK_KEY: &str = "stratum:health-check";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, patterns) = load_config()?;
    tracing::info!(
        redis_url = %config.redis_url,
        patterns = patterns.len(),
        local_capacity = config.local_capacity,
        "Stratum check starting"
    );
    report_patterns(&patterns);

    if health_check_with(&config, patterns).await? {
        tracing::info!("all checks passed");
        Ok(())
    } else {
        tracing::error!("checks failed");
        std::process::exit(1);
    }
}

/// Exit code `0` when every check passes.
async fn run_health_check() -> i32 {
    match health_check().await {
        Ok(true) => 0,
        _ => 1,
    }
}

async fn health_check() -> anyhow::Result<bool> {
    let (config, patterns) = load_config()?;
    health_check_with(&config, patterns).await
}

fn load_config() -> anyhow::Result<(Config, PatternTable)> {
    let config = Config::from_env().context("reading STRATUM_* environment")?;
    config.validate().context("validating configuration")?;
    let patterns = config.load_patterns().context("loading pattern table")?;
    Ok((config, patterns))
}

fn report_patterns(patterns: &PatternTable) {
    let defaults = CacheOptions::default();
    for name in patterns.names() {
        let resolved = patterns.resolve_config(name, &defaults);
        tracing::info!(
            pattern = name,
            ttl_secs = resolved.ttl.as_secs(),
            strategy = %resolved.strategy,
            tiers = ?resolved.tiers,
            "pattern"
        );
    }
}

/// Round-trips a key through L2 and a lock with the configured lock options.
async fn health_check_with(config: &Config, patterns: PatternTable) -> anyhow::Result<bool> {
    let cache = TieredCache::from_config(config, patterns).context("connecting remote store")?;
    let remote: &dyn KeyValueStore = cache.remote().store().as_ref();
    remote.ping().await.context("remote store did not answer")?;

    let remote_only = CacheOptions::new().tiers([TierId::L2Remote]);
    let marker = uuid::Uuid::new_v4().to_string();
    cache.set(CHECK_KEY, &marker, &remote_only).await;
    let read_back: Option<String> = cache.get(CHECK_KEY, &remote_only).await;
    cache.delete(CHECK_KEY).await;
    if read_back.as_deref() != Some(marker.as_str()) {
        tracing::error!(key = CHECK_KEY, "remote tier did not return the written value");
        return Ok(false);
    }

    let store: Arc<dyn KeyValueStore> = Arc::clone(cache.remote().store());
    let locks = LockManager::with_defaults(store, config.lock_options());
    let lock_key = format!("{}:{}", CHECK_KEY, marker);
    let Some(handle) = locks.acquire_default(&lock_key).await else {
        tracing::error!(key = %lock_key, "could not acquire check lock");
        return Ok(false);
    };
    tracing::debug!(
        key = %lock_key,
        ttl_ms = handle.ttl.as_millis() as u64,
        "check lock acquired"
    );
    if !locks.release(&handle).await {
        tracing::error!(key = %lock_key, "check lock release failed");
        return Ok(false);
    }

    Ok(true)
}
