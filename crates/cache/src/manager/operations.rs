//! Cache state and the operations on it
//!
//! Nothing here locks: the manager holds its mutex around every call.

use super::statistics::{CacheStatistics, MemoryUsage};
use crate::config::{CacheConfig, ExistingKeyPolicy, MemoryAccounting};
use crate::entry::{CacheEntry, EntryOptions};
use crate::errors::{Error, Result};
use crate::eviction::{EvictionCandidate, EvictionStrategy};
use crate::flyweight::{ContentCategory, ContentFlyweight, FlyweightRegistry};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Tracks payload bytes with each distinct flyweight counted once
#[derive(Debug, Default)]
struct MemoryAccount {
    /// Entry references per flyweight, keyed by allocation address
    references: HashMap<usize, usize>,
    flyweight_bytes: u64,
    logical_bytes: u64,
}

impl MemoryAccount {
    fn on_insert<V>(&mut self, flyweight: &Arc<ContentFlyweight<V>>) {
        let size = flyweight.size_bytes();
        self.logical_bytes += size;

        let references = self
            .references
            .entry(Arc::as_ptr(flyweight) as usize)
            .or_insert(0);
        if *references == 0 {
            self.flyweight_bytes += size;
        }
        *references += 1;
    }

    fn on_remove<V>(&mut self, flyweight: &Arc<ContentFlyweight<V>>) {
        let size = flyweight.size_bytes();
        self.logical_bytes = self.logical_bytes.saturating_sub(size);

        let address = Arc::as_ptr(flyweight) as usize;
        if let Some(references) = self.references.get_mut(&address) {
            *references -= 1;
            if *references == 0 {
                self.references.remove(&address);
                self.flyweight_bytes = self.flyweight_bytes.saturating_sub(size);
            }
        }
    }
}

/// Everything guarded by the manager lock
pub(super) struct CacheState<V> {
    /// Insertion-ordered so eviction ties resolve reproducibly
    entries: IndexMap<String, CacheEntry<V>>,
    registry: FlyweightRegistry<V>,
    memory: MemoryAccount,
    pub(super) stats: CacheStatistics,
}

impl<V> CacheState<V> {
    pub(super) fn new(registry: FlyweightRegistry<V>) -> Self {
        Self {
            entries: IndexMap::new(),
            registry,
            memory: MemoryAccount::default(),
            stats: CacheStatistics::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn registry(&self) -> &FlyweightRegistry<V> {
        &self.registry
    }

    pub(super) fn registry_mut(&mut self) -> &mut FlyweightRegistry<V> {
        &mut self.registry
    }

    pub(super) fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub(super) fn memory_usage(&self, config: &CacheConfig) -> MemoryUsage {
        let entry_overhead_bytes = self.entries.len() as u64 * config.entry_overhead_bytes;
        let payload_bytes = match config.memory_accounting {
            MemoryAccounting::Shared => self.memory.flyweight_bytes,
            MemoryAccounting::PerEntry => self.memory.logical_bytes,
        };
        MemoryUsage {
            current_bytes: payload_bytes + entry_overhead_bytes,
            flyweight_bytes: self.memory.flyweight_bytes,
            entry_overhead_bytes,
            logical_bytes: self.memory.logical_bytes,
            referenced_flyweights: self.memory.references.len(),
        }
    }

    fn over_budget(&self, config: &CacheConfig) -> bool {
        self.memory_usage(config).current_bytes > config.max_memory_bytes
            || self.entries.len() > config.max_entries
    }

    /// Look up a live entry, recording a hit or a miss
    ///
    /// Expired entries are removed on the spot and count as a miss.
    pub(super) fn get(&mut self, key: &str, now: Instant) -> Option<Arc<ContentFlyweight<V>>> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove(key);
            self.stats.record_expired(1);
            self.stats.record_miss();
            tracing::trace!(key, "Removed expired entry on access");
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        self.stats.record_hit();
        Some(Arc::clone(entry.flyweight()))
    }

    pub(super) fn remove(&mut self, key: &str) -> bool {
        match self.entries.shift_remove(key) {
            Some(entry) => {
                self.memory.on_remove(entry.flyweight());
                true
            }
            None => false,
        }
    }

    /// Remove every entry matching `predicate`, keeping the order of the rest
    fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&CacheEntry<V>) -> bool,
    {
        let memory = &mut self.memory;
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if predicate(entry) {
                memory.on_remove(entry.flyweight());
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    pub(super) fn invalidate_by_tags(&mut self, tags: &BTreeSet<String>) -> usize {
        if tags.is_empty() {
            return 0;
        }
        let removed = self.remove_where(|entry| entry.has_any_tag(tags));
        self.stats.record_invalidations(removed);
        removed
    }

    pub(super) fn cleanup_expired(&mut self, now: Instant) -> usize {
        let removed = self.remove_where(|entry| entry.is_expired(now));
        if removed > 0 {
            self.stats.record_expired(removed);
            self.registry.cleanup_unreferenced();
        }
        removed
    }

    /// Number of victims for one eviction pass
    ///
    /// Enough to bring the entry count down to the target ratio of
    /// `max_entries`, and at least a tenth of the entries (at least one) so
    /// memory pressure always makes progress.
    fn victim_count(&self, config: &CacheConfig) -> usize {
        let len = self.entries.len();
        let entry_target = (config.max_entries as f64 * config.eviction_target_ratio).ceil() as usize;
        let entry_excess = len.saturating_sub(entry_target);
        entry_excess.max(len / 10).max(1).min(len)
    }

    pub(super) fn force_eviction(
        &mut self,
        target_memory_bytes: u64,
        config: &CacheConfig,
        strategy: &dyn EvictionStrategy,
        now: Instant,
    ) -> Result<usize> {
        let current_bytes = self.memory_usage(config).current_bytes;
        if current_bytes <= target_memory_bytes && self.entries.len() <= config.max_entries {
            return Ok(0);
        }
        if self.entries.is_empty() {
            return Ok(0);
        }

        let to_evict = self.victim_count(config);
        let victims: HashSet<String> = {
            let candidates: Vec<EvictionCandidate<'_>> =
                self.entries.values().map(CacheEntry::candidate).collect();
            strategy
                .select_victims(&candidates, to_evict, now)?
                .into_iter()
                .collect()
        };

        let removed = self.remove_where(|entry| victims.contains(entry.key()));
        self.stats.record_evictions(removed);
        self.registry.cleanup_unreferenced();

        tracing::info!(
            evicted = removed,
            strategy = strategy.name(),
            memory_before = current_bytes,
            memory_after = self.memory_usage(config).current_bytes,
            entries = self.entries.len(),
            "Evicted cache entries"
        );
        Ok(removed)
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
        self.memory = MemoryAccount::default();
        self.registry.clear();
        self.stats = CacheStatistics::new();
    }
}

impl<V: Serialize> CacheState<V> {
    /// Insert or touch `key`
    ///
    /// Under [`ExistingKeyPolicy::Touch`] a live entry keeps its content and
    /// options and only records an access. An expired entry is treated as
    /// absent. A serialization failure leaves the cache unchanged.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn put(
        &mut self,
        key: String,
        value: V,
        category: ContentCategory,
        options: EntryOptions,
        policy: ExistingKeyPolicy,
        config: &CacheConfig,
        strategy: &dyn EvictionStrategy,
        now: Instant,
    ) -> Result<bool> {
        if !(options.production_cost.is_finite() && options.production_cost >= 0.0) {
            return Err(Error::configuration(format!(
                "production_cost for '{key}' must be finite and non-negative, got {}",
                options.production_cost
            )));
        }

        if let Some(existing) = self.entries.get_mut(&key) {
            if existing.is_expired(now) {
                self.remove(&key);
                self.stats.record_expired(1);
            } else if policy == ExistingKeyPolicy::Touch {
                existing.touch(now);
                return Ok(true);
            }
        }

        let flyweight = self
            .registry
            .get_or_create(value, category, options.production_cost)
            .map_err(|e| e.with_key(&key))?;

        // Replacing: the old entry goes only once the new content is ready
        self.remove(&key);

        self.memory.on_insert(&flyweight);
        let ttl = options.ttl.unwrap_or(config.default_ttl);
        let entry = CacheEntry::new(key.clone(), flyweight, now, ttl, options.priority, options.tags);
        self.entries.insert(key, entry);

        if self.over_budget(config) {
            self.stats.record_memory_pressure();
            tracing::debug!(
                entries = self.entries.len(),
                max_entries = config.max_entries,
                memory = self.memory_usage(config).current_bytes,
                max_memory = config.max_memory_bytes,
                "Cache over budget, evicting"
            );
            self.force_eviction(config.target_memory_bytes(), config, strategy, now)?;
        }

        Ok(true)
    }
}
