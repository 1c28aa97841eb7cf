//! Fingerprint-keyed registry of weakly held flyweights

use super::{ContentCategory, ContentFlyweight, FlyweightInfo, RegistryStats};
use crate::errors::Result;
use crate::hashing::{canonical_bytes, ContentHasher, Fingerprint, Sha256Hasher};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

#[derive(Debug, Default, Clone, Copy)]
struct RegistryCounters {
    total_requests: u64,
    hits: u64,
    misses: u64,
    created: u64,
}

/// Hands out one shared flyweight per distinct content fingerprint
///
/// The table only holds [`Weak`] references: entries own their flyweights,
/// and a flyweight whose last owner is dropped simply fails to upgrade and is
/// treated as absent. Dead slots are reused on the next miss for the same
/// fingerprint and swept by [`cleanup_unreferenced`](Self::cleanup_unreferenced).
///
/// The registry itself is not synchronized; the cache manager mutates it
/// under the same lock that guards its entry map.
pub struct FlyweightRegistry<V> {
    hasher: Arc<dyn ContentHasher>,
    table: HashMap<Fingerprint, Weak<ContentFlyweight<V>>>,
    counters: RegistryCounters,
}

impl<V: Serialize> FlyweightRegistry<V> {
    pub fn new() -> Self {
        Self::with_hasher(Arc::new(Sha256Hasher))
    }

    pub fn with_hasher(hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            hasher,
            table: HashMap::new(),
            counters: RegistryCounters::default(),
        }
    }

    /// Fingerprint a value without registering it
    pub fn fingerprint(&self, value: &V) -> Result<Fingerprint> {
        let canonical = canonical_bytes(value)?;
        Ok(self.hasher.digest(&canonical))
    }

    /// Return the live flyweight for `value`'s content, creating it on a miss
    ///
    /// On a hit the supplied value, category and cost are discarded: the
    /// first producer of a given content decides its metadata.
    pub fn get_or_create(
        &mut self,
        value: V,
        category: ContentCategory,
        production_cost: f64,
    ) -> Result<Arc<ContentFlyweight<V>>> {
        let canonical = canonical_bytes(&value)?;
        let fingerprint = self.hasher.digest(&canonical);

        self.counters.total_requests += 1;

        if let Some(existing) = self.table.get(&fingerprint).and_then(Weak::upgrade) {
            self.counters.hits += 1;
            tracing::trace!(
                fingerprint = %fingerprint.short(16),
                "Reusing existing flyweight"
            );
            return Ok(existing);
        }

        self.counters.misses += 1;
        self.counters.created += 1;

        let flyweight = Arc::new(ContentFlyweight::new(
            category,
            fingerprint.clone(),
            canonical.len() as u64,
            production_cost,
            value,
        ));

        tracing::trace!(
            fingerprint = %fingerprint.short(16),
            category = %category,
            size_bytes = canonical.len(),
            hasher = self.hasher.name(),
            "Created new flyweight"
        );

        self.table.insert(fingerprint, Arc::downgrade(&flyweight));
        Ok(flyweight)
    }

    /// Look up the live flyweight for a fingerprint without counting a request
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<ContentFlyweight<V>>> {
        self.table.get(fingerprint).and_then(Weak::upgrade)
    }
}

impl<V> FlyweightRegistry<V> {
    /// Drop table slots whose flyweight is no longer alive
    ///
    /// Returns how many slots were swept. Reclamation itself already happened
    /// when the last owner was dropped; this only compacts the table.
    pub fn cleanup_unreferenced(&mut self) -> usize {
        let before = self.table.len();
        self.table.retain(|_, weak| weak.strong_count() > 0);
        before - self.table.len()
    }

    /// Forget every flyweight
    ///
    /// Entries keep their flyweights alive, but the registry will no longer
    /// deduplicate against them. Returns the number of slots dropped.
    pub fn force_cleanup_all(&mut self) -> usize {
        let dropped = self.table.len();
        self.table.clear();
        dropped
    }

    /// Number of flyweights currently alive
    pub fn active_count(&self) -> usize {
        self.table
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of physical table slots, live or dead
    pub fn slot_count(&self) -> usize {
        self.table.len()
    }

    /// Reset the table and all counters
    pub fn clear(&mut self) {
        self.table.clear();
        self.counters = RegistryCounters::default();
    }

    pub fn stats(&self) -> RegistryStats {
        let mut memory_by_type = BTreeMap::new();
        let mut active = 0usize;
        for flyweight in self.table.values().filter_map(Weak::upgrade) {
            active += 1;
            *memory_by_type.entry(flyweight.category()).or_insert(0) += flyweight.size_bytes();
        }

        let counters = self.counters;
        let (hit_ratio, miss_ratio) = if counters.total_requests > 0 {
            (
                counters.hits as f64 / counters.total_requests as f64,
                counters.misses as f64 / counters.total_requests as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let reclaimed = counters.created.saturating_sub(active as u64);

        RegistryStats {
            total_flyweights: active,
            total_flyweights_ever_created: counters.created,
            flyweights_reclaimed: reclaimed,
            total_requests: counters.total_requests,
            hits: counters.hits,
            misses: counters.misses,
            hit_ratio,
            miss_ratio,
            memory_by_type,
            reclamation_efficiency: reclaimed as f64 / counters.created.max(1) as f64 * 100.0,
        }
    }

    /// Describe every live flyweight, ordered by fingerprint
    pub fn active_flyweights_info(&self) -> Vec<FlyweightInfo> {
        let mut live: Vec<_> = self
            .table
            .iter()
            .filter_map(|(fingerprint, weak)| weak.upgrade().map(|fw| (fingerprint, fw)))
            .collect();
        live.sort_by(|a, b| a.0.cmp(b.0));

        live.into_iter()
            .map(|(fingerprint, flyweight)| FlyweightInfo {
                fingerprint: fingerprint.short(16),
                category: flyweight.category(),
                size_bytes: flyweight.size_bytes(),
                production_cost: flyweight.production_cost(),
                // Minus the temporary upgrade held here
                strong_refs: Arc::strong_count(&flyweight) - 1,
            })
            .collect()
    }
}

impl<V: Serialize> Default for FlyweightRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}
