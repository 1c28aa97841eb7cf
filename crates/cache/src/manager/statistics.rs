//! Cache statistics tracking and reporting

use crate::flyweight::RegistryStats;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifetime counters, reset only by [`CacheManager::clear`](super::CacheManager::clear)
///
/// Updated under the manager lock; recording can never fail an operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub memory_pressure_events: u64,
    pub expired_removals: u64,
    pub invalidations: u64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_memory_pressure(&mut self) {
        self.memory_pressure_events += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired_removals += count as u64;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    /// Fraction of lookups that hit, 0.0 before any lookup
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn miss_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }
}

/// Memory accounting snapshot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    /// Charged against the memory budget: payload bytes per the configured
    /// accounting mode plus entry overhead
    pub current_bytes: u64,
    /// Payload bytes, each distinct flyweight counted once
    pub flyweight_bytes: u64,
    /// Fixed per-entry metadata charge times the entry count
    pub entry_overhead_bytes: u64,
    /// Payload bytes summed over entries, as if nothing were shared
    pub logical_bytes: u64,
    /// Distinct flyweights referenced by at least one entry
    pub referenced_flyweights: usize,
}

impl MemoryUsage {
    /// How many times over the shared payload bytes are used, 1.0 when empty
    pub fn deduplication_ratio(&self) -> f64 {
        if self.flyweight_bytes == 0 {
            1.0
        } else {
            self.logical_bytes as f64 / self.flyweight_bytes as f64
        }
    }
}

/// Point-in-time snapshot returned by
/// [`CacheManager::get_cache_stats`](super::CacheManager::get_cache_stats)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub current_memory_bytes: u64,
    pub max_memory_bytes: u64,
    pub current_entries: usize,
    pub max_entries: usize,
    pub evictions: u64,
    pub memory_pressure_events: u64,
    pub expired_removals: u64,
    pub invalidations: u64,
    pub eviction_strategy: &'static str,
    pub memory: MemoryUsage,
    pub deduplication_ratio: f64,
    pub flyweight_stats: RegistryStats,
    pub captured_at: DateTime<Utc>,
}
