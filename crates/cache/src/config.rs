//! Cache configuration management with precedence and validation
//!
//! Precedence, lowest to highest: built-in defaults, the JSON file named by
//! `FLYCACHE_CONFIG`, then individual `FLYCACHE_*` environment variables.

use crate::errors::{Error, RecoveryHint, Result, SerializationOp};
use crate::eviction::EvictionStrategyKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_FILE: &str = "FLYCACHE_CONFIG";
pub const ENV_MAX_MEMORY_BYTES: &str = "FLYCACHE_MAX_MEMORY_BYTES";
pub const ENV_MAX_ENTRIES: &str = "FLYCACHE_MAX_ENTRIES";
pub const ENV_EVICTION_STRATEGY: &str = "FLYCACHE_EVICTION_STRATEGY";
pub const ENV_ENTRY_OVERHEAD_BYTES: &str = "FLYCACHE_ENTRY_OVERHEAD_BYTES";
pub const ENV_DEFAULT_TTL_SECS: &str = "FLYCACHE_DEFAULT_TTL_SECS";
pub const ENV_EXISTING_KEY_POLICY: &str = "FLYCACHE_EXISTING_KEY_POLICY";
pub const ENV_MEMORY_ACCOUNTING: &str = "FLYCACHE_MEMORY_ACCOUNTING";

/// What `put` does when the key already holds a live entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingKeyPolicy {
    /// Keep the stored content, TTL and priority; only record an access
    #[default]
    Touch,
    /// Replace the entry with the new content and options
    Replace,
}

impl std::str::FromStr for ExistingKeyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "touch" => Ok(Self::Touch),
            "replace" => Ok(Self::Replace),
            _ => Err(Error::Configuration {
                message: format!("Unknown existing-key policy: {s}"),
                recovery_hint: RecoveryHint::UseDefault {
                    value: "touch".to_string(),
                },
            }),
        }
    }
}

/// Which payload bytes are charged against `max_memory_bytes`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryAccounting {
    /// Each distinct flyweight once, however many entries share it
    #[default]
    Shared,
    /// Every entry pays for its payload, as if nothing were shared
    PerEntry,
}

impl std::str::FromStr for MemoryAccounting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "shared" => Ok(Self::Shared),
            "per_entry" => Ok(Self::PerEntry),
            _ => Err(Error::Configuration {
                message: format!("Unknown memory accounting mode: {s}"),
                recovery_hint: RecoveryHint::UseDefault {
                    value: "shared".to_string(),
                },
            }),
        }
    }
}

/// Cache manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory budget in bytes: payload bytes as chosen by
    /// `memory_accounting` plus per-entry overhead
    ///
    /// With the default [`MemoryAccounting::Shared`], content shared by many
    /// keys is charged once, so heavily deduplicated workloads reach memory
    /// pressure later than with [`MemoryAccounting::PerEntry`].
    pub max_memory_bytes: u64,
    /// Entry-count budget
    pub max_entries: usize,
    /// Strategy used to pick eviction victims
    pub eviction_strategy: EvictionStrategyKind,
    /// Bytes charged per entry for its metadata
    pub entry_overhead_bytes: u64,
    /// Fraction of each budget eviction aims for
    pub eviction_target_ratio: f64,
    /// TTL used when a put does not specify one
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    pub existing_key_policy: ExistingKeyPolicy,
    pub memory_accounting: MemoryAccounting,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 1000 * 1024 * 1024, // 1000MB
            max_entries: 10_000,
            eviction_strategy: EvictionStrategyKind::LruWeighted,
            entry_overhead_bytes: 200,
            eviction_target_ratio: 0.8,
            default_ttl: Duration::from_secs(3600),
            existing_key_policy: ExistingKeyPolicy::Touch,
            memory_accounting: MemoryAccounting::Shared,
        }
    }
}

impl CacheConfig {
    /// Reject configurations the manager cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_bytes == 0 {
            return Err(Error::configuration("max_memory_bytes must be positive"));
        }
        if self.max_entries == 0 {
            return Err(Error::configuration("max_entries must be positive"));
        }
        if !(self.eviction_target_ratio > 0.0 && self.eviction_target_ratio <= 1.0) {
            return Err(Error::configuration(format!(
                "eviction_target_ratio must be in (0, 1], got {}",
                self.eviction_target_ratio
            )));
        }
        Ok(())
    }

    /// Memory level `force_eviction` aims for by default
    pub fn target_memory_bytes(&self) -> u64 {
        (self.max_memory_bytes as f64 * self.eviction_target_ratio) as u64
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Set programmatically through the builder
    Builder,
}

/// Builder for cache configurations
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.config.max_memory_bytes = bytes;
        self
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.config.max_entries = entries;
        self
    }

    pub fn with_eviction_strategy(mut self, kind: EvictionStrategyKind) -> Self {
        self.config.eviction_strategy = kind;
        self
    }

    pub fn with_entry_overhead_bytes(mut self, bytes: u64) -> Self {
        self.config.entry_overhead_bytes = bytes;
        self
    }

    pub fn with_eviction_target_ratio(mut self, ratio: f64) -> Self {
        self.config.eviction_target_ratio = ratio;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn with_existing_key_policy(mut self, policy: ExistingKeyPolicy) -> Self {
        self.config.existing_key_policy = policy;
        self
    }

    pub fn with_memory_accounting(mut self, accounting: MemoryAccounting) -> Self {
        self.config.memory_accounting = accounting;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration together with where its last layer came from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: CacheConfig,
    pub source: ConfigSource,
}

/// Configuration loader that handles precedence
pub struct CacheConfigLoader;

impl CacheConfigLoader {
    /// Load configuration with full precedence handling
    pub fn load() -> Result<LoadedConfig> {
        let mut loaded = LoadedConfig {
            config: CacheConfig::default(),
            source: ConfigSource::Default,
        };

        if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
            let path = PathBuf::from(path);
            loaded.config = Self::load_from_file(&path)?;
            loaded.source = ConfigSource::ConfigFile(path);
        }

        if let Some(var) = Self::apply_env(&mut loaded.config)? {
            loaded.source = ConfigSource::EnvironmentVariable(var);
        }

        loaded.config.validate()?;
        tracing::debug!(source = ?loaded.source, config = ?loaded.config, "Loaded cache configuration");
        Ok(loaded)
    }

    /// Read a JSON configuration file; missing fields take their defaults
    pub fn load_from_file(path: &Path) -> Result<CacheConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            operation: "read config file",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })?;

        let config: CacheConfig =
            serde_json::from_str(&content).map_err(|e| Error::Serialization {
                key: path.display().to_string(),
                operation: SerializationOp::Decode,
                source: Box::new(e),
                recovery_hint: RecoveryHint::Manual {
                    instructions: "Check config file syntax".to_string(),
                },
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `FLYCACHE_*` overrides, returning the last variable applied
    fn apply_env(config: &mut CacheConfig) -> Result<Option<String>> {
        let mut last = None;

        if let Some(value) = Self::env_parsed::<u64>(ENV_MAX_MEMORY_BYTES)? {
            config.max_memory_bytes = value;
            last = Some(ENV_MAX_MEMORY_BYTES);
        }

        if let Some(value) = Self::env_parsed::<usize>(ENV_MAX_ENTRIES)? {
            config.max_entries = value;
            last = Some(ENV_MAX_ENTRIES);
        }

        if let Ok(value) = std::env::var(ENV_EVICTION_STRATEGY) {
            config.eviction_strategy = value.parse()?;
            last = Some(ENV_EVICTION_STRATEGY);
        }

        if let Some(value) = Self::env_parsed::<u64>(ENV_ENTRY_OVERHEAD_BYTES)? {
            config.entry_overhead_bytes = value;
            last = Some(ENV_ENTRY_OVERHEAD_BYTES);
        }

        if let Some(value) = Self::env_parsed::<u64>(ENV_DEFAULT_TTL_SECS)? {
            config.default_ttl = Duration::from_secs(value);
            last = Some(ENV_DEFAULT_TTL_SECS);
        }

        if let Ok(value) = std::env::var(ENV_EXISTING_KEY_POLICY) {
            config.existing_key_policy = value.parse()?;
            last = Some(ENV_EXISTING_KEY_POLICY);
        }

        if let Ok(value) = std::env::var(ENV_MEMORY_ACCOUNTING) {
            config.memory_accounting = value.parse()?;
            last = Some(ENV_MEMORY_ACCOUNTING);
        }

        Ok(last.map(str::to_string))
    }

    fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
        match std::env::var(name) {
            Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| Error::Configuration {
                message: format!("{name} has invalid value '{raw}'"),
                recovery_hint: RecoveryHint::FixInput {
                    instructions: format!("Set {name} to a non-negative integer"),
                },
            }),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_file_reports_its_own_path() {
        let path = Path::new("/nonexistent/flycache/config.json");
        match CacheConfigLoader::load_from_file(path) {
            Err(Error::Io {
                path: reported,
                operation,
                recovery_hint: RecoveryHint::CheckPermissions { path: hinted },
                ..
            }) => {
                assert_eq!(reported, path);
                assert_eq!(hinted, path);
                assert_eq!(operation, "read config file");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_memory_bytes, 1_048_576_000);
        assert_eq!(config.target_memory_bytes(), 838_860_800);
        assert_eq!(config.existing_key_policy, ExistingKeyPolicy::Touch);
    }

    #[test]
    fn test_builder_validation() {
        let config = CacheConfigBuilder::new()
            .with_max_entries(50)
            .with_max_memory_bytes(4096)
            .with_eviction_strategy(EvictionStrategyKind::Smart)
            .with_entry_overhead_bytes(64)
            .with_default_ttl(Duration::from_secs(30))
            .with_existing_key_policy(ExistingKeyPolicy::Replace)
            .build()
            .unwrap();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.eviction_strategy, EvictionStrategyKind::Smart);

        assert!(CacheConfigBuilder::new().with_max_entries(0).build().is_err());
        assert!(CacheConfigBuilder::new()
            .with_max_memory_bytes(0)
            .build()
            .is_err());
        assert!(CacheConfigBuilder::new()
            .with_eviction_target_ratio(1.5)
            .build()
            .is_err());
        assert!(CacheConfigBuilder::new()
            .with_eviction_target_ratio(f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"max_entries": 12, "eviction_strategy": "smart", "default_ttl": 1.5}"#)
                .unwrap();
        assert_eq!(config.max_entries, 12);
        assert_eq!(config.eviction_strategy, EvictionStrategyKind::Smart);
        assert_eq!(config.default_ttl, Duration::from_millis(1500));
        assert_eq!(config.entry_overhead_bytes, 200);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = CacheConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["eviction_strategy"], "lru");
        assert_eq!(json["existing_key_policy"], "touch");
        assert_eq!(json["default_ttl"], 3600.0);
    }

    #[test]
    fn test_memory_accounting_parsing() {
        assert_eq!(
            "per-entry".parse::<MemoryAccounting>().unwrap(),
            MemoryAccounting::PerEntry
        );
        assert_eq!(
            " Shared ".parse::<MemoryAccounting>().unwrap(),
            MemoryAccounting::Shared
        );
        assert!("logical".parse::<MemoryAccounting>().is_err());

        let config: CacheConfig =
            serde_json::from_str(r#"{"memory_accounting": "per_entry"}"#).unwrap();
        assert_eq!(config.memory_accounting, MemoryAccounting::PerEntry);
        assert_eq!(CacheConfig::default().memory_accounting, MemoryAccounting::Shared);
    }

    #[test]
    fn test_existing_key_policy_parsing() {
        assert_eq!(
            "Replace".parse::<ExistingKeyPolicy>().unwrap(),
            ExistingKeyPolicy::Replace
        );
        let err = "upsert".parse::<ExistingKeyPolicy>().unwrap_err();
        assert!(matches!(
            err.recovery_hint(),
            RecoveryHint::UseDefault { value } if value == "touch"
        ));
    }
}
