use super::*;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

use crate::lock::LockManager;
use crate::store::MemoryStore;

const ALL_VARS: &[&str] = &[
    "STRATUM_REDIS_URL",
    "STRATUM_REDIS_POOL_SIZE",
    "STRATUM_REDIS_TIMEOUT_MS",
    "STRATUM_LOCAL_CAPACITY",
    "STRATUM_LOCAL_FRESHNESS_SECS",
    "STRATUM_SWEEP_INTERVAL_SECS",
    "STRATUM_SWEEP_HORIZON_SECS",
    "STRATUM_PROPAGATION_TTL_SECS",
    "STRATUM_MEMORY_CAPACITY",
    "STRATUM_PATTERNS_PATH",
    "STRATUM_LOCK_TTL_MS",
    "STRATUM_LOCK_MAX_RETRIES",
    "STRATUM_LOCK_RETRY_DELAY_MS",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_stratum_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in ALL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    assert_eq!(config.redis_pool_size, 16);
    assert_eq!(config.local_capacity, 100);
    assert_eq!(config.local_freshness, Duration::from_secs(30));
    assert_eq!(config.sweep_interval, Duration::from_secs(300));
    assert_eq!(config.sweep_horizon, Duration::from_secs(1800));
    assert_eq!(config.propagation_ttl, Duration::from_secs(3600));
    assert!(config.patterns_path.is_none());
}

#[test]
fn test_default_lock_options() {
    let options = Config::default().lock_options();

    assert_eq!(options.ttl, Duration::from_secs(10));
    assert_eq!(options.max_retries, 3);
    assert_eq!(options.retry_delay, Duration::from_millis(100));
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_stratum_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.redis_url, Config::default().redis_url);
    assert_eq!(config.local_capacity, 100);
    assert_eq!(config.lock_max_retries, 3);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_stratum_env();

    let config = with_env_vars(
        &[
            ("STRATUM_REDIS_URL", "redis://cache.internal:6380/2"),
            ("STRATUM_LOCAL_CAPACITY", "500"),
            ("STRATUM_LOCAL_FRESHNESS_SECS", "5"),
            ("STRATUM_SWEEP_HORIZON_SECS", "600"),
            ("STRATUM_REDIS_TIMEOUT_MS", "250"),
            ("STRATUM_LOCK_MAX_RETRIES", "10"),
        ],
        Config::from_env,
    )
    .expect("should parse overrides");

    assert_eq!(config.redis_url, "redis://cache.internal:6380/2");
    assert_eq!(config.local_capacity, 500);
    assert_eq!(config.local_freshness, Duration::from_secs(5));
    assert_eq!(config.sweep_horizon, Duration::from_secs(600));
    assert_eq!(config.redis_timeout, Duration::from_millis(250));
    assert_eq!(config.lock_max_retries, 10);
}

#[test]
#[serial]
fn test_from_env_trims_whitespace() {
    clear_stratum_env();

    let config = with_env_vars(&[("STRATUM_MEMORY_CAPACITY", " 2048 ")], Config::from_env)
        .expect("should trim");

    assert_eq!(config.memory_capacity, 2048);
}

#[test]
#[serial]
fn test_from_env_invalid_number() {
    clear_stratum_env();

    let result = with_env_vars(&[("STRATUM_LOCAL_CAPACITY", "lots")], Config::from_env);

    match result {
        Err(ConfigError::InvalidNumber { name, value, .. }) => {
            assert_eq!(name, "STRATUM_LOCAL_CAPACITY");
            assert_eq!(value, "lots");
        }
        other => panic!("expected InvalidNumber, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_from_env_negative_number_rejected() {
    clear_stratum_env();

    let result = with_env_vars(&[("STRATUM_LOCK_TTL_MS", "-5")], Config::from_env);

    assert!(matches!(result, Err(ConfigError::InvalidNumber { .. })));
}

#[test]
#[serial]
fn test_from_env_empty_patterns_path_is_none() {
    clear_stratum_env();

    let config = with_env_vars(&[("STRATUM_PATTERNS_PATH", "   ")], Config::from_env)
        .expect("should parse");

    assert!(config.patterns_path.is_none());
}

#[test]
fn test_validate_default_ok() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_capacity() {
    let config = Config {
        local_capacity: 0,
        ..Default::default()
    };

    match config.validate() {
        Err(ConfigError::ZeroValue { name }) => assert_eq!(name, "STRATUM_LOCAL_CAPACITY"),
        other => panic!("expected ZeroValue, got {:?}", other),
    }
}

#[test]
fn test_validate_rejects_zero_lock_ttl() {
    let config = Config {
        lock_ttl: Duration::ZERO,
        ..Default::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroValue { name: "STRATUM_LOCK_TTL_MS" })
    ));
}

#[test]
#[serial]
fn test_validate_rejects_zero_sweep_interval_from_env() {
    clear_stratum_env();
    let config = with_env_vars(&[("STRATUM_SWEEP_INTERVAL_SECS", "0")], || {
        Config::from_env().unwrap()
    });

    assert_eq!(config.sweep_interval, Duration::ZERO);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroValue { name: "STRATUM_SWEEP_INTERVAL_SECS" })
    ));
}

#[test]
fn test_validate_missing_patterns_path() {
    let config = Config {
        patterns_path: Some(PathBuf::from("/nonexistent/stratum/patterns.json")),
        ..Default::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::PathNotFound { .. })
    ));
}

#[test]
fn test_validate_patterns_path_is_directory() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        patterns_path: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    assert!(matches!(config.validate(), Err(ConfigError::NotAFile { .. })));
}

#[test]
fn test_load_patterns_builtin_without_path() {
    let table = Config::default().load_patterns().unwrap();
    assert_eq!(table, PatternTable::builtin());
}

#[test]
fn test_load_patterns_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"[{"name": "invoices", "ttl_secs": 120}]"#).unwrap();

    let config = Config {
        patterns_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    assert!(config.validate().is_ok());
    let names: Vec<String> = config
        .load_patterns()
        .unwrap()
        .names()
        .map(str::to_string)
        .collect();
    assert_eq!(names, vec!["invoices".to_string()]);
}

#[test]
fn test_derived_component_configs() {
    let config = Config {
        redis_pool_size: 4,
        local_capacity: 7,
        sweep_interval: Duration::from_secs(1),
        ..Default::default()
    };

    let redis = config.redis_store_config();
    assert_eq!(redis.pool_size, 4);
    assert_eq!(redis.url, config.redis_url);

    let local = config.local_cache_config();
    assert_eq!(local.capacity, 7);
    assert_eq!(local.sweep_interval, Duration::from_secs(1));
}

#[tokio::test]
#[serial]
async fn test_lock_settings_from_env_reach_lock_manager() {
    clear_stratum_env();
    let config = with_env_vars(
        &[
            ("STRATUM_LOCK_TTL_MS", "2500"),
            ("STRATUM_LOCK_MAX_RETRIES", "1"),
            ("STRATUM_LOCK_RETRY_DELAY_MS", "5"),
        ],
        || Config::from_env().unwrap(),
    );

    let locks = LockManager::with_defaults(
        Arc::new(MemoryStore::with_capacity(10)),
        config.lock_options(),
    );
    assert_eq!(locks.defaults().max_retries, 1);

    let handle = locks.acquire_default("reports:nightly").await.unwrap();
    assert_eq!(handle.ttl, Duration::from_millis(2500));
    assert!(locks.acquire_default("reports:nightly").await.is_none());
    assert!(locks.release(&handle).await);
}
