//! Key-pattern → cache configuration resolution.
//!
//! A [`PatternTable`] is an ordered, immutable list of named [`PatternSpec`]s. A key matches
//! the first pattern whose name appears as a substring of the key. Resolution merges three
//! layers field by field: per-call [`CacheOptions`], the matched pattern, then
//! [`PatternConfig::global_default`].

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{CacheOptions, Strategy, TierId};
use crate::config::ConfigError;
use crate::constants::{DEFAULT_PATTERN, DEFAULT_TTL_SECS, hours, secs};

/// One row of the pattern table. Absent fields fall through to the global default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSpec {
    pub ttl: Option<Duration>,
    pub strategy: Option<Strategy>,
    pub tiers: Option<Vec<TierId>>,
}

impl PatternSpec {
    pub fn new(ttl: Duration, strategy: Strategy, tiers: impl Into<Vec<TierId>>) -> Self {
        Self {
            ttl: Some(ttl),
            strategy: Some(strategy),
            tiers: Some(tiers.into()),
        }
    }
}

/// Fully resolved configuration for one operation.
///
/// `tiers` is sorted fastest first and contains no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternConfig {
    pub ttl: Duration,
    pub strategy: Strategy,
    pub tiers: Vec<TierId>,
}

impl PatternConfig {
    /// `{ttl: 3600s, strategy: exact-match, tiers: [L1, L2]}`.
    pub fn global_default() -> Self {
        Self {
            ttl: secs(DEFAULT_TTL_SECS),
            strategy: Strategy::ExactMatch,
            tiers: vec![TierId::L1Memory, TierId::L2Remote],
        }
    }

    #[inline]
    pub fn uses(&self, tier: TierId) -> bool {
        self.tiers.contains(&tier)
    }
}

/// JSON shape of a pattern table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatternRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strategy: Option<Strategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tiers: Option<Vec<TierId>>,
}

impl From<PatternRecord> for (String, PatternSpec) {
    fn from(record: PatternRecord) -> Self {
        (
            record.name,
            PatternSpec {
                ttl: record.ttl_secs.map(Duration::from_secs),
                strategy: record.strategy,
                tiers: record.tiers,
            },
        )
    }
}

/// Immutable pattern table, built once at startup and injected into the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTable {
    patterns: Vec<(String, PatternSpec)>,
    fallback: PatternSpec,
}

impl PatternTable {
    /// Builds a table from `(name, spec)` rows. Row order is the match order.
    ///
    /// A row named `default` replaces the fallback used for unmatched keys and never
    /// participates in substring matching.
    pub fn new(rows: impl IntoIterator<Item = (String, PatternSpec)>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        let mut fallback = PatternSpec::default();

        for (name, spec) in rows {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyPatternName);
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicatePattern { name });
            }
            if name == DEFAULT_PATTERN {
                fallback = spec;
            } else {
                patterns.push((name, spec));
            }
        }

        Ok(Self { patterns, fallback })
    }

    /// The built-in table used when no pattern file is configured.
    pub fn builtin() -> Self {
        let global = PatternConfig::global_default();
        let patterns = vec![
            (
                "ai-responses".to_string(),
                PatternSpec::new(
                    hours(72),
                    Strategy::SemanticDedup,
                    [TierId::L1Memory, TierId::L2Remote],
                ),
            ),
            (
                "voice-transcripts".to_string(),
                PatternSpec::new(
                    hours(24),
                    Strategy::ExactMatch,
                    [TierId::L1Memory, TierId::L2Remote],
                ),
            ),
            (
                "synthesized-audio".to_string(),
                PatternSpec::new(hours(7 * 24), Strategy::ContentHash, [TierId::L2Remote]),
            ),
            (
                "user-context".to_string(),
                PatternSpec::new(
                    hours(24),
                    Strategy::SlidingWindow,
                    [TierId::L0Local, TierId::L1Memory],
                ),
            ),
            (
                "integration-data".to_string(),
                PatternSpec::new(
                    secs(5 * 60),
                    Strategy::RefreshAhead,
                    [TierId::L0Local, TierId::L1Memory, TierId::L2Remote],
                ),
            ),
            (
                "vector-search".to_string(),
                PatternSpec::new(
                    hours(48),
                    Strategy::SimilarityThreshold,
                    [TierId::L1Memory, TierId::L2Remote],
                ),
            ),
        ];

        Self {
            patterns,
            fallback: PatternSpec::new(global.ttl, global.strategy, global.tiers),
        }
    }

    /// Parses a JSON array of `{ "name", "ttl_secs"?, "strategy"?, "tiers"? }` rows.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let records: Vec<PatternRecord> =
            serde_json::from_str(json).map_err(|source| ConfigError::InvalidPatterns { source })?;
        Self::new(records.into_iter().map(Into::into))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::PatternFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Returns the first pattern name contained in `key`, or `"default"`.
    pub fn detect_pattern<'a>(&'a self, key: &str) -> &'a str {
        self.patterns
            .iter()
            .find(|(name, _)| key.contains(name.as_str()))
            .map(|(name, _)| name.as_str())
            .unwrap_or(DEFAULT_PATTERN)
    }

    /// Returns the spec for `pattern`; unknown names get the fallback.
    pub fn spec(&self, pattern: &str) -> &PatternSpec {
        self.patterns
            .iter()
            .find(|(name, _)| name == pattern)
            .map(|(_, spec)| spec)
            .unwrap_or(&self.fallback)
    }

    /// Merges overrides → pattern spec → global default, field by field. Never fails.
    pub fn resolve_config(&self, pattern: &str, overrides: &CacheOptions) -> PatternConfig {
        let spec = self.spec(pattern);
        let global = PatternConfig::global_default();

        let ttl = overrides.ttl.or(spec.ttl).unwrap_or(global.ttl);
        let strategy = overrides
            .strategy
            .or(spec.strategy)
            .unwrap_or(global.strategy);
        let mut tiers = non_empty(overrides.tiers.as_ref())
            .or_else(|| non_empty(spec.tiers.as_ref()))
            .cloned()
            .unwrap_or(global.tiers);

        tiers.sort();
        tiers.dedup();

        PatternConfig {
            ttl,
            strategy,
            tiers,
        }
    }

    /// [`detect_pattern`](Self::detect_pattern) followed by [`resolve_config`](Self::resolve_config).
    pub fn resolve(&self, key: &str, overrides: &CacheOptions) -> PatternConfig {
        self.resolve_config(self.detect_pattern(key), overrides)
    }

    /// Pattern names in match order (excluding `default`).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn non_empty(tiers: Option<&Vec<TierId>>) -> Option<&Vec<TierId>> {
    tiers.filter(|t| !t.is_empty())
}
