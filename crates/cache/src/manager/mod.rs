//! Thread-safe cache manager facade
//!
//! [`CacheManager`] owns the entry map, the flyweight registry and the
//! counters behind one mutex. Every public method takes the lock for its
//! whole duration, so operations from different threads are totally ordered
//! and no caller ever observes a half-applied update.

mod builder;
mod operations;
mod statistics;

pub use builder::CacheManagerBuilder;
pub use statistics::{CacheStatistics, CacheStats, MemoryUsage};

use crate::clock::Clock;
use crate::config::{CacheConfig, CacheConfigLoader, ExistingKeyPolicy};
use crate::entry::{EntryInfo, EntryOptions};
use crate::errors::Result;
use crate::eviction::{create_eviction_strategy, EvictionStrategy};
use crate::flyweight::{ContentCategory, ContentFlyweight, FlyweightInfo, FlyweightRegistry};
use operations::CacheState;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Deduplicating in-memory cache
///
/// Values are stored once per distinct canonical serialization and shared
/// between keys. Memory and entry budgets are enforced synchronously inside
/// `put`. Share the manager between threads with an [`Arc`].
pub struct CacheManager<V = serde_json::Value> {
    config: CacheConfig,
    strategy: Box<dyn EvictionStrategy>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
}

impl<V: Serialize> CacheManager<V> {
    /// Create a manager with the given budgets and strategy, other settings default
    pub fn new(
        max_memory_bytes: u64,
        max_entries: usize,
        eviction_strategy: Box<dyn EvictionStrategy>,
    ) -> Result<Self> {
        CacheManagerBuilder::new()
            .with_max_memory_bytes(max_memory_bytes)
            .with_max_entries(max_entries)
            .with_eviction_strategy(eviction_strategy)
            .build()
    }

    /// Create a manager from a configuration, using the strategy it names
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let strategy = create_eviction_strategy(config.eviction_strategy);
        Ok(Self::from_parts(
            config,
            strategy,
            FlyweightRegistry::new(),
            Arc::new(crate::clock::SystemClock),
        ))
    }

    /// Create a manager configured from `FLYCACHE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let loaded = CacheConfigLoader::load()?;
        tracing::info!(source = ?loaded.source, "Cache configuration loaded");
        Self::with_config(loaded.config)
    }

    pub fn builder() -> CacheManagerBuilder<V> {
        CacheManagerBuilder::new()
    }

    /// Store `value` under `key` with default priority and cost
    ///
    /// `ttl` falls back to the configured default. Returns `true` once the
    /// key holds an entry. If the key already holds a live entry, the
    /// configured [`ExistingKeyPolicy`] decides whether it is replaced or
    /// merely touched.
    pub fn put(
        &self,
        key: impl Into<String>,
        value: V,
        category: ContentCategory,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let options = EntryOptions {
            ttl,
            ..EntryOptions::default()
        };
        self.put_with(key, value, category, options)
    }

    /// Store `value` under `key` with explicit entry options
    pub fn put_with(
        &self,
        key: impl Into<String>,
        value: V,
        category: ContentCategory,
        options: EntryOptions,
    ) -> Result<bool> {
        self.put_with_policy(
            key.into(),
            value,
            category,
            options,
            self.config.existing_key_policy,
        )
    }

    /// Store `value` under `key`, replacing any live entry
    pub fn replace(
        &self,
        key: impl Into<String>,
        value: V,
        category: ContentCategory,
        options: EntryOptions,
    ) -> Result<bool> {
        self.put_with_policy(
            key.into(),
            value,
            category,
            options,
            ExistingKeyPolicy::Replace,
        )
    }

    fn put_with_policy(
        &self,
        key: String,
        value: V,
        category: ContentCategory,
        options: EntryOptions,
        policy: ExistingKeyPolicy,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.put(
            key,
            value,
            category,
            options,
            policy,
            &self.config,
            self.strategy.as_ref(),
            now,
        )
    }
}

impl<V> CacheManager<V> {
    pub(crate) fn from_parts(
        config: CacheConfig,
        strategy: Box<dyn EvictionStrategy>,
        registry: FlyweightRegistry<V>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            strategy,
            clock,
            state: Mutex::new(CacheState::new(registry)),
        }
    }

    /// Fetch a clone of the value stored under `key`
    ///
    /// Misses and expired entries return `None`; an expired entry is removed
    /// as a side effect.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        // Clone after the lock is released
        self.get_flyweight(key)
            .map(|flyweight| flyweight.payload().clone())
    }

    /// Like [`get`](Self::get) but hands out the shared flyweight itself
    pub fn get_flyweight(&self, key: &str) -> Option<Arc<ContentFlyweight<V>>> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.get(key, now)
    }

    /// Remove `key`, returning whether it existed
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.state.lock().remove(key);
        if removed {
            tracing::trace!(key, "Deleted cache entry");
        }
        removed
    }

    /// Remove every entry carrying at least one of `tags`
    pub fn invalidate_by_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|tag| tag.as_ref().to_string())
            .collect();
        let removed = self.state.lock().invalidate_by_tags(&tags);
        tracing::debug!(?tags, removed, "Invalidated cache entries by tag");
        removed
    }

    /// Remove every expired entry, returning how many went
    pub fn cleanup_expired(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let now = self.clock.now();
            state.cleanup_expired(now)
        };
        tracing::debug!(removed, "Cleaned up expired cache entries");
        removed
    }

    /// Evict towards the configured target memory level
    ///
    /// A no-op returning 0 when memory is already at or below the target and
    /// the entry count is within budget.
    pub fn force_eviction(&self) -> Result<usize> {
        self.force_eviction_to(self.config.target_memory_bytes())
    }

    /// Evict towards an explicit target memory level
    pub fn force_eviction_to(&self, target_memory_bytes: u64) -> Result<usize> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.force_eviction(
            target_memory_bytes,
            &self.config,
            self.strategy.as_ref(),
            now,
        )
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let state = self.state.lock();
        let memory = state.memory_usage(&self.config);
        let counters = &state.stats;

        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            hit_ratio: counters.hit_ratio(),
            miss_ratio: counters.miss_ratio(),
            current_memory_bytes: memory.current_bytes,
            max_memory_bytes: self.config.max_memory_bytes,
            current_entries: state.len(),
            max_entries: self.config.max_entries,
            evictions: counters.evictions,
            memory_pressure_events: counters.memory_pressure_events,
            expired_removals: counters.expired_removals,
            invalidations: counters.invalidations,
            eviction_strategy: self.strategy.name(),
            memory,
            deduplication_ratio: memory.deduplication_ratio(),
            flyweight_stats: state.registry().stats(),
            captured_at: chrono::Utc::now(),
        }
    }

    pub fn get_memory_usage(&self) -> MemoryUsage {
        self.state.lock().memory_usage(&self.config)
    }

    /// Statistics snapshot as pretty-printed JSON
    pub fn export_metrics_json(&self) -> Result<String> {
        let stats = self.get_cache_stats();
        Ok(serde_json::to_string_pretty(&stats)?)
    }

    /// Diagnostic listing of every live flyweight
    pub fn active_flyweights_info(&self) -> Vec<FlyweightInfo> {
        self.state.lock().registry().active_flyweights_info()
    }

    /// Sweep registry slots whose flyweight has been reclaimed
    pub fn cleanup_unreferenced_flyweights(&self) -> usize {
        self.state.lock().registry_mut().cleanup_unreferenced()
    }

    /// Forget every registry slot; live entries keep their content untracked
    pub fn force_cleanup_all_flyweights(&self) -> usize {
        let dropped = self.state.lock().registry_mut().force_cleanup_all();
        tracing::warn!(dropped, "Dropped all flyweight registry slots");
        dropped
    }

    /// Read-only snapshot of one entry, expired or not, without touching it
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let state = self.state.lock();
        let now = self.clock.now();
        state.entry(key).map(|entry| entry.info(now))
    }

    /// Whether `key` holds a live entry; neither touches nor removes it
    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.state.lock();
        let now = self.clock.now();
        state
            .entry(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Number of entries, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset the registry and counters
    pub fn clear(&self) {
        self.state.lock().clear();
        tracing::info!("Cache cleared");
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::CacheError;
    use crate::eviction::LruWeightedStrategy;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn manager(max_entries: usize, clock: &ManualClock) -> CacheManager<Value> {
        CacheManager::builder()
            .with_max_entries(max_entries)
            .with_eviction_strategy(Box::new(LruWeightedStrategy))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        assert!(cache
            .put("user:1", json!({"name": "Ada", "id": 1}), ContentCategory::DatabaseQuery, None)
            .unwrap());
        assert_eq!(cache.get("user:1"), Some(json!({"id": 1, "name": "Ada"})));
        assert_eq!(cache.get("user:2"), None);

        let stats = cache.get_cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.current_entries, 1);
    }

    #[test]
    fn test_lru_eviction_on_entry_budget() {
        let clock = ManualClock::new();
        let cache = manager(2, &clock);

        cache.put("a", json!("A"), ContentCategory::ApiResponse, None).unwrap();
        clock.advance(Duration::from_secs(1));
        cache.put("b", json!("B"), ContentCategory::ApiResponse, None).unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), Some(json!("A")));
        clock.advance(Duration::from_secs(1));
        cache.put("c", json!("C"), ContentCategory::ApiResponse, None).unwrap();

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(json!("A")));
        assert_eq!(cache.get("c"), Some(json!("C")));

        let stats = cache.get_cache_stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.memory_pressure_events, 1);
        assert_eq!(stats.current_entries, 2);
    }

    #[test]
    fn test_repeated_put_only_touches() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        let options = EntryOptions::new()
            .with_ttl(Duration::from_secs(60))
            .with_priority(3);
        cache
            .put_with("k", json!("first"), ContentCategory::ComputedResult, options)
            .unwrap();
        assert!(cache
            .put("k", json!("second"), ContentCategory::ComputedResult, Some(Duration::from_secs(1)))
            .unwrap());

        assert_eq!(cache.get_flyweight("k").unwrap().payload(), &json!("first"));
        let info = cache.entry_info("k").unwrap();
        // One from the repeated put, one from the get above
        assert_eq!(info.access_count, 2);
        assert_eq!(info.ttl, Duration::from_secs(60));
        assert_eq!(info.priority, 3);
    }

    #[test]
    fn test_replace_stores_new_content() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache.put("k", json!("first"), ContentCategory::ComputedResult, None).unwrap();
        cache
            .replace(
                "k",
                json!("second"),
                ContentCategory::ComputedResult,
                EntryOptions::new().with_priority(7),
            )
            .unwrap();

        assert_eq!(cache.get("k"), Some(json!("second")));
        assert_eq!(cache.entry_info("k").unwrap().priority, 7);
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_flyweights, 1);
    }

    #[test]
    fn test_lazy_expiry() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache
            .put("k", json!(1), ContentCategory::ApiResponse, Some(Duration::from_secs(10)))
            .unwrap();
        clock.advance(Duration::from_secs(10));
        assert!(cache.contains_key("k"));

        clock.advance(Duration::from_secs(1));
        assert!(!cache.contains_key("k"));
        // Still stored until touched
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());

        let stats = cache.get_cache_stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expired_removals, 1);
    }

    #[test]
    fn test_cleanup_expired_leaves_live_entries() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache
            .put("short", json!(1), ContentCategory::ApiResponse, Some(Duration::from_secs(1)))
            .unwrap();
        cache
            .put("long", json!(2), ContentCategory::ApiResponse, Some(Duration::from_secs(100)))
            .unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.get("long"), Some(json!(2)));
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_flyweights, 1);
    }

    #[test]
    fn test_deduplication_across_keys() {
        let clock = ManualClock::new();
        let cache = manager(100, &clock);
        let payload = json!({"rows": [1, 2, 3], "total": 3});

        for i in 0..10 {
            cache
                .put(format!("query:{i}"), payload.clone(), ContentCategory::DatabaseQuery, None)
                .unwrap();
        }

        let stats = cache.get_cache_stats();
        assert_eq!(stats.flyweight_stats.total_flyweights, 1);
        assert_eq!(stats.flyweight_stats.hits, 9);
        assert_eq!(stats.memory.logical_bytes, 10 * stats.memory.flyweight_bytes);
        assert_eq!(stats.deduplication_ratio, 10.0);

        let first = cache.get_flyweight("query:0").unwrap();
        let last = cache.get_flyweight("query:9").unwrap();
        assert!(Arc::ptr_eq(&first, &last));
    }

    #[test]
    fn test_flyweight_reclaimed_when_last_entry_goes() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache.put("a", json!("shared"), ContentCategory::FileContent, None).unwrap();
        cache.put("b", json!("shared"), ContentCategory::FileContent, None).unwrap();

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_flyweights, 1);

        assert!(cache.delete("b"));
        let stats = cache.get_cache_stats();
        assert_eq!(stats.flyweight_stats.total_flyweights, 0);
        assert_eq!(stats.flyweight_stats.flyweights_reclaimed, 1);
        assert_eq!(cache.cleanup_unreferenced_flyweights(), 1);
    }

    fn tagged(tags: &[&str]) -> EntryOptions {
        EntryOptions::new().with_tags(tags.iter().copied())
    }

    #[test]
    fn test_invalidate_by_tags() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache.put_with("a", json!(1), ContentCategory::ApiResponse, tagged(&["t1"])).unwrap();
        cache.put_with("b", json!(2), ContentCategory::ApiResponse, tagged(&["t1", "t2"])).unwrap();
        cache.put_with("c", json!(3), ContentCategory::ApiResponse, tagged(&["t2"])).unwrap();
        cache.put("d", json!(4), ContentCategory::ApiResponse, None).unwrap();

        assert_eq!(cache.invalidate_by_tags(["t1"]), 2);
        assert_eq!(cache.invalidate_by_tags(["t1"]), 0);
        assert_eq!(cache.invalidate_by_tags(Vec::<String>::new()), 0);
        assert!(cache.contains_key("c"));
        assert!(cache.contains_key("d"));
        assert_eq!(cache.get_cache_stats().invalidations, 2);
    }

    #[test]
    fn test_force_eviction_is_idempotent() {
        let clock = ManualClock::new();
        let cache = manager(100, &clock);

        for i in 0..20 {
            cache.put(format!("k{i}"), json!(i), ContentCategory::ApiResponse, None).unwrap();
        }
        assert_eq!(cache.force_eviction().unwrap(), 0);

        // Target below current usage: at least a tenth goes
        assert_eq!(cache.force_eviction_to(0).unwrap(), 2);
        assert_eq!(cache.len(), 18);
        assert_eq!(cache.force_eviction().unwrap(), 0);
        assert_eq!(cache.get_cache_stats().evictions, 2);
    }

    #[test]
    fn test_memory_budget_triggers_eviction() {
        let clock = ManualClock::new();
        let cache: CacheManager<Value> = CacheManager::builder()
            .with_max_memory_bytes(1_000)
            .with_entry_overhead_bytes(100)
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        for i in 0..20 {
            clock.advance(Duration::from_millis(10));
            cache.put(format!("k{i}"), json!(i), ContentCategory::ApiResponse, None).unwrap();
        }

        let stats = cache.get_cache_stats();
        assert!(stats.memory_pressure_events > 0);
        assert!(stats.evictions > 0);
        assert!(stats.current_memory_bytes <= 1_000);
        // The most recent entry survives under LRU
        assert!(cache.contains_key("k19"));
    }

    #[test]
    fn test_serialization_failure_leaves_cache_unchanged() {
        let clock = ManualClock::new();
        let cache: CacheManager<HashMap<(u8, u8), u8>> = CacheManager::builder()
            .with_clock(Arc::new(clock))
            .build()
            .unwrap();

        let value = HashMap::from([((1, 2), 3)]);
        let err = cache
            .put("bad", value, ContentCategory::ComputedResult, None)
            .unwrap_err();

        match err {
            CacheError::Serialization { key, .. } => assert_eq!(key, "bad"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.is_empty());
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_flyweights, 0);
    }

    #[test]
    fn test_infinities_are_rejected_not_merged() {
        let cache: CacheManager<f64> = CacheManager::builder().build().unwrap();

        cache.put("finite", 2.5, ContentCategory::ComputedResult, None).unwrap();
        for (key, value) in [("pos", f64::INFINITY), ("neg", f64::NEG_INFINITY)] {
            let err = cache
                .put(key, value, ContentCategory::ComputedResult, None)
                .unwrap_err();
            match err {
                CacheError::Serialization { key: reported, .. } => assert_eq!(reported, key),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("neg"), None);
        assert_eq!(cache.get("finite"), Some(2.5));
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_flyweights, 1);
    }

    #[test]
    fn test_nan_does_not_share_content_with_none() {
        let cache: CacheManager<Option<f64>> = CacheManager::builder().build().unwrap();

        cache.put("missing", None, ContentCategory::DatabaseQuery, None).unwrap();
        let result = cache.put("nan", Some(f64::NAN), ContentCategory::DatabaseQuery, None);

        assert!(matches!(result, Err(CacheError::Serialization { .. })));
        assert_eq!(cache.get("nan"), None);
        assert_eq!(cache.get("missing"), Some(None));
        assert_eq!(cache.get_cache_stats().flyweight_stats.total_requests, 1);
    }

    #[test]
    fn test_invalid_production_cost_is_rejected() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        for cost in [-1.0, f64::NAN, f64::INFINITY] {
            let result = cache.put_with(
                "k",
                json!(1),
                ContentCategory::ComputedResult,
                EntryOptions::new().with_production_cost(cost),
            );
            assert!(matches!(result, Err(CacheError::Configuration { .. })));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_resets_everything() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);

        cache.put("a", json!(1), ContentCategory::ApiResponse, None).unwrap();
        cache.get("a");
        cache.get("missing");
        cache.clear();

        let stats = cache.get_cache_stats();
        assert!(cache.is_empty());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.current_memory_bytes, 0);
        assert_eq!(stats.flyweight_stats.total_flyweights_ever_created, 0);

        cache.put("a", json!(1), ContentCategory::ApiResponse, None).unwrap();
        assert_eq!(cache.get("a"), Some(json!(1)));
    }

    #[test]
    fn test_export_metrics_json() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);
        cache.put("a", json!("x"), ContentCategory::DatabaseQuery, None).unwrap();
        cache.get("a");

        let exported: Value = serde_json::from_str(&cache.export_metrics_json().unwrap()).unwrap();
        assert_eq!(exported["hits"], 1);
        assert_eq!(exported["current_entries"], 1);
        assert_eq!(exported["max_entries"], 10);
        assert_eq!(exported["eviction_strategy"], "lru");
        assert_eq!(exported["flyweight_stats"]["total_flyweights"], 1);
        assert!(exported["flyweight_stats"]["memory_by_type"]["db_query"].is_u64());
        assert!(exported["captured_at"].is_string());
    }

    #[test]
    fn test_active_flyweights_info() {
        let clock = ManualClock::new();
        let cache = manager(10, &clock);
        cache.put("a", json!("x"), ContentCategory::FileContent, None).unwrap();
        cache.put("b", json!("x"), ContentCategory::FileContent, None).unwrap();

        let info = cache.active_flyweights_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].fingerprint.len(), 16);
        assert_eq!(info[0].category, ContentCategory::FileContent);
        assert_eq!(info[0].strong_refs, 2);
    }
}
