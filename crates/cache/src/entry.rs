//! Per-key cache entries and their lifecycle metadata

use crate::eviction::EvictionCandidate;
use crate::flyweight::ContentFlyweight;
use crate::hashing::Fingerprint;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options accepted by [`CacheManager::put_with`](crate::CacheManager::put_with)
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOptions {
    /// Time to live; the manager's configured default when `None`
    pub ttl: Option<Duration>,
    /// Higher values are protected from eviction more strongly
    pub priority: u32,
    /// Cost to recompute the value, must be finite and non-negative
    pub production_cost: f64,
    /// Labels for bulk invalidation
    pub tags: BTreeSet<String>,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            priority: 1,
            production_cost: 1.0,
            tags: BTreeSet::new(),
        }
    }
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_production_cost(mut self, cost: f64) -> Self {
        self.production_cost = cost;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Mutable per-key record pointing at a shared flyweight
///
/// Entries are owned exclusively by the cache manager; many entries may hold
/// the same flyweight.
#[derive(Debug)]
pub struct CacheEntry<V> {
    key: String,
    flyweight: Arc<ContentFlyweight<V>>,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
    ttl: Duration,
    priority: u32,
    tags: BTreeSet<String>,
}

impl<V> CacheEntry<V> {
    pub fn new(
        key: String,
        flyweight: Arc<ContentFlyweight<V>>,
        now: Instant,
        ttl: Duration,
        priority: u32,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            key,
            flyweight,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            priority,
            tags,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn flyweight(&self) -> &Arc<ContentFlyweight<V>> {
        &self.flyweight
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Evaluated on every call, never cached
    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }

    /// Record one successful access
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed_at)
    }

    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }

    /// Recency-weighted score; higher means evicted sooner
    pub fn eviction_score(&self, now: Instant) -> f64 {
        self.candidate().lru_score(now)
    }

    /// Borrowed view handed to eviction strategies
    pub fn candidate(&self) -> EvictionCandidate<'_> {
        EvictionCandidate {
            key: &self.key,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            priority: self.priority,
            size_bytes: self.flyweight.size_bytes(),
            production_cost: self.flyweight.production_cost(),
        }
    }

    pub fn info(&self, now: Instant) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            fingerprint: self.flyweight.fingerprint().clone(),
            category: self.flyweight.category().as_str(),
            size_bytes: self.flyweight.size_bytes(),
            production_cost: self.flyweight.production_cost(),
            access_count: self.access_count,
            priority: self.priority,
            ttl: self.ttl,
            tags: self.tags.clone(),
            age: self.age(now),
            idle: self.idle(now),
            expired: self.is_expired(now),
        }
    }
}

/// Read-only snapshot of one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub fingerprint: Fingerprint,
    pub category: &'static str,
    pub size_bytes: u64,
    pub production_cost: f64,
    pub access_count: u64,
    pub priority: u32,
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
    pub age: Duration,
    pub idle: Duration,
    pub expired: bool,
}
