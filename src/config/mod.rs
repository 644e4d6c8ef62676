//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `STRATUM_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{LocalCacheConfig, PatternTable};
use crate::constants::{
    DEFAULT_LOCAL_CAPACITY, DEFAULT_LOCAL_FRESHNESS_SECS, DEFAULT_LOCK_MAX_RETRIES,
    DEFAULT_LOCK_RETRY_DELAY_MS, DEFAULT_LOCK_TTL_MS, DEFAULT_MEMORY_CAPACITY,
    DEFAULT_PROPAGATION_TTL_SECS, DEFAULT_REDIS_URL, DEFAULT_SWEEP_HORIZON_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::lock::LockOptions;
use crate::store::RedisStoreConfig;

/// Cache configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `STRATUM_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis URL for the L2 tier and locks. Default: `redis://127.0.0.1:6379`.
    pub redis_url: String,

    /// Max pooled Redis connections. Default: `16`.
    pub redis_pool_size: usize,

    /// Pool wait/create/recycle timeout. Default: 500ms.
    pub redis_timeout: Duration,

    /// Max entries in L0. Default: `100`.
    pub local_capacity: usize,

    /// L0 read-path freshness window. Default: 30s.
    pub local_freshness: Duration,

    /// L0 sweep period. Default: 5m.
    pub sweep_interval: Duration,

    /// L0 sweep age horizon. Default: 30m.
    pub sweep_horizon: Duration,

    /// TTL written when a hit is propagated to faster tiers. Default: 1h.
    pub propagation_ttl: Duration,

    /// Max entries in the L1 memory store. Default: `10_000`.
    pub memory_capacity: u64,

    /// Optional JSON pattern table replacing the built-in one.
    pub patterns_path: Option<PathBuf>,

    /// Default lock TTL. Default: 10s.
    pub lock_ttl: Duration,

    /// Default lock acquisition attempts. Default: `3`.
    pub lock_max_retries: u32,

    /// Delay between lock attempts. Default: 100ms.
    pub lock_retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            redis_pool_size: 16,
            redis_timeout: Duration::from_millis(500),
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            local_freshness: Duration::from_secs(DEFAULT_LOCAL_FRESHNESS_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_horizon: Duration::from_secs(DEFAULT_SWEEP_HORIZON_SECS),
            propagation_ttl: Duration::from_secs(DEFAULT_PROPAGATION_TTL_SECS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            patterns_path: None,
            lock_ttl: Duration::from_millis(DEFAULT_LOCK_TTL_MS),
            lock_max_retries: DEFAULT_LOCK_MAX_RETRIES,
            lock_retry_delay: Duration::from_millis(DEFAULT_LOCK_RETRY_DELAY_MS),
        }
    }
}

impl Config {
    const ENV_REDIS_URL: &'static str = "STRATUM_REDIS_URL";
    const ENV_REDIS_POOL_SIZE: &'static str = "STRATUM_REDIS_POOL_SIZE";
    const ENV_REDIS_TIMEOUT_MS: &'static str = "STRATUM_REDIS_TIMEOUT_MS";
    const ENV_LOCAL_CAPACITY: &'static str = "STRATUM_LOCAL_CAPACITY";
    const ENV_LOCAL_FRESHNESS_SECS: &'static str = "STRATUM_LOCAL_FRESHNESS_SECS";
    const ENV_SWEEP_INTERVAL_SECS: &'static str = "STRATUM_SWEEP_INTERVAL_SECS";
    const ENV_SWEEP_HORIZON_SECS: &'static str = "STRATUM_SWEEP_HORIZON_SECS";
    const ENV_PROPAGATION_TTL_SECS: &'static str = "STRATUM_PROPAGATION_TTL_SECS";
    const ENV_MEMORY_CAPACITY: &'static str = "STRATUM_MEMORY_CAPACITY";
    const ENV_PATTERNS_PATH: &'static str = "STRATUM_PATTERNS_PATH";
    const ENV_LOCK_TTL_MS: &'static str = "STRATUM_LOCK_TTL_MS";
    const ENV_LOCK_MAX_RETRIES: &'static str = "STRATUM_LOCK_MAX_RETRIES";
    const ENV_LOCK_RETRY_DELAY_MS: &'static str = "STRATUM_LOCK_RETRY_DELAY_MS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            redis_url: Self::parse_string_from_env(Self::ENV_REDIS_URL, defaults.redis_url),
            redis_pool_size: Self::parse_u64_from_env(
                Self::ENV_REDIS_POOL_SIZE,
                defaults.redis_pool_size as u64,
            )? as usize,
            redis_timeout: Self::parse_millis_from_env(
                Self::ENV_REDIS_TIMEOUT_MS,
                defaults.redis_timeout,
            )?,
            local_capacity: Self::parse_u64_from_env(
                Self::ENV_LOCAL_CAPACITY,
                defaults.local_capacity as u64,
            )? as usize,
            local_freshness: Self::parse_secs_from_env(
                Self::ENV_LOCAL_FRESHNESS_SECS,
                defaults.local_freshness,
            )?,
            sweep_interval: Self::parse_secs_from_env(
                Self::ENV_SWEEP_INTERVAL_SECS,
                defaults.sweep_interval,
            )?,
            sweep_horizon: Self::parse_secs_from_env(
                Self::ENV_SWEEP_HORIZON_SECS,
                defaults.sweep_horizon,
            )?,
            propagation_ttl: Self::parse_secs_from_env(
                Self::ENV_PROPAGATION_TTL_SECS,
                defaults.propagation_ttl,
            )?,
            memory_capacity: Self::parse_u64_from_env(
                Self::ENV_MEMORY_CAPACITY,
                defaults.memory_capacity,
            )?,
            patterns_path: Self::parse_optional_path_from_env(Self::ENV_PATTERNS_PATH),
            lock_ttl: Self::parse_millis_from_env(Self::ENV_LOCK_TTL_MS, defaults.lock_ttl)?,
            lock_max_retries: Self::parse_u64_from_env(
                Self::ENV_LOCK_MAX_RETRIES,
                defaults.lock_max_retries as u64,
            )? as u32,
            lock_retry_delay: Self::parse_millis_from_env(
                Self::ENV_LOCK_RETRY_DELAY_MS,
                defaults.lock_retry_delay,
            )?,
        })
    }

    /// Validates positivity invariants and the pattern file path (does not read it).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("STRATUM_REDIS_POOL_SIZE", self.redis_pool_size as u64),
            ("STRATUM_LOCAL_CAPACITY", self.local_capacity as u64),
            ("STRATUM_MEMORY_CAPACITY", self.memory_capacity),
            ("STRATUM_SWEEP_INTERVAL_SECS", self.sweep_interval.as_secs()),
            ("STRATUM_LOCK_TTL_MS", self.lock_ttl.as_millis() as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::ZeroValue { name });
            }
        }

        if let Some(ref path) = self.patterns_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Loads the pattern file if one is configured, otherwise the built-in table.
    pub fn load_patterns(&self) -> Result<PatternTable, ConfigError> {
        match self.patterns_path {
            Some(ref path) => PatternTable::from_json_file(path),
            None => Ok(PatternTable::builtin()),
        }
    }

    pub fn redis_store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            url: self.redis_url.clone(),
            pool_size: self.redis_pool_size,
            timeout: self.redis_timeout,
        }
    }

    pub fn local_cache_config(&self) -> LocalCacheConfig {
        LocalCacheConfig {
            capacity: self.local_capacity,
            freshness: self.local_freshness,
            sweep_interval: self.sweep_interval,
            sweep_horizon: self.sweep_horizon,
        }
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            ttl: self.lock_ttl,
            max_retries: self.lock_max_retries,
            retry_delay: self.lock_retry_delay,
        }
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    source,
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_secs_from_env(var_name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        Self::parse_u64_from_env(var_name, default.as_secs()).map(Duration::from_secs)
    }

    fn parse_millis_from_env(
        var_name: &'static str,
        default: Duration,
    ) -> Result<Duration, ConfigError> {
        Self::parse_u64_from_env(var_name, default.as_millis() as u64).map(Duration::from_millis)
    }
}
