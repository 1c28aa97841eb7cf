//! Cache manager builder

use super::CacheManager;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, CacheConfigBuilder, ExistingKeyPolicy, MemoryAccounting};
use crate::errors::Result;
use crate::eviction::{create_eviction_strategy, EvictionStrategy, EvictionStrategyKind};
use crate::flyweight::FlyweightRegistry;
use crate::hashing::{ContentHasher, Sha256Hasher};
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`CacheManager`]
///
/// Budgets and policies go through [`CacheConfigBuilder`]; the collaborators
/// (strategy, hasher, clock) default to the configured strategy kind,
/// SHA-256 and the system clock.
pub struct CacheManagerBuilder<V = serde_json::Value> {
    config: CacheConfigBuilder,
    strategy: Option<Box<dyn EvictionStrategy>>,
    hasher: Option<Arc<dyn ContentHasher>>,
    clock: Option<Arc<dyn Clock>>,
    _payload: PhantomData<fn() -> V>,
}

impl<V: Serialize> CacheManagerBuilder<V> {
    pub fn new() -> Self {
        Self {
            config: CacheConfigBuilder::new(),
            strategy: None,
            hasher: None,
            clock: None,
            _payload: PhantomData,
        }
    }

    /// Start from a complete configuration, e.g. one from [`CacheConfigLoader`](crate::CacheConfigLoader)
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = CacheConfigBuilder::from_config(config);
        self
    }

    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.config = self.config.with_max_memory_bytes(bytes);
        self
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.config = self.config.with_max_entries(entries);
        self
    }

    pub fn with_eviction_strategy_kind(mut self, kind: EvictionStrategyKind) -> Self {
        self.config = self.config.with_eviction_strategy(kind);
        self
    }

    pub fn with_entry_overhead_bytes(mut self, bytes: u64) -> Self {
        self.config = self.config.with_entry_overhead_bytes(bytes);
        self
    }

    pub fn with_eviction_target_ratio(mut self, ratio: f64) -> Self {
        self.config = self.config.with_eviction_target_ratio(ratio);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.config = self.config.with_default_ttl(ttl);
        self
    }

    pub fn with_existing_key_policy(mut self, policy: ExistingKeyPolicy) -> Self {
        self.config = self.config.with_existing_key_policy(policy);
        self
    }

    pub fn with_memory_accounting(mut self, accounting: MemoryAccounting) -> Self {
        self.config = self.config.with_memory_accounting(accounting);
        self
    }

    /// Use a custom strategy instead of the one named by the configuration
    pub fn with_eviction_strategy(mut self, strategy: Box<dyn EvictionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and build the manager
    pub fn build(self) -> Result<CacheManager<V>> {
        let config = self.config.build()?;
        let strategy = self
            .strategy
            .unwrap_or_else(|| create_eviction_strategy(config.eviction_strategy));
        let hasher = self.hasher.unwrap_or_else(|| Arc::new(Sha256Hasher));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        tracing::debug!(
            max_memory_bytes = config.max_memory_bytes,
            max_entries = config.max_entries,
            strategy = strategy.name(),
            hasher = hasher.name(),
            "Building cache manager"
        );

        Ok(CacheManager::from_parts(
            config,
            strategy,
            FlyweightRegistry::with_hasher(hasher),
            clock,
        ))
    }
}

impl<V: Serialize> Default for CacheManagerBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}
