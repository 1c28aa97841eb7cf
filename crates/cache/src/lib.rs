//! In-process deduplicating cache
//!
//! This crate provides a memory-bounded cache where values with identical
//! content are stored once and shared between keys:
//! - Content fingerprinting over a canonical JSON encoding
//! - A weak-reference flyweight registry that reclaims unused content
//! - TTL expiry, priorities and tag-based invalidation
//! - Pluggable eviction (recency-weighted LRU and a multi-factor strategy)
//! - Statistics snapshots exportable as JSON
//!
//! ```no_run
//! use flycache::{CacheManager, ContentCategory, LruWeightedStrategy};
//! use serde_json::json;
//!
//! # fn main() -> flycache::Result<()> {
//! let cache: CacheManager = CacheManager::new(64 * 1024 * 1024, 1_000, Box::new(LruWeightedStrategy))?;
//! cache.put("user:1", json!({"name": "Ada"}), ContentCategory::DatabaseQuery, None)?;
//! assert!(cache.get("user:1").is_some());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod entry;
pub mod errors;
pub mod eviction;
pub mod flyweight;
pub mod hashing;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheConfig, CacheConfigBuilder, CacheConfigLoader, ConfigSource, ExistingKeyPolicy,
    LoadedConfig, MemoryAccounting,
};
pub use entry::{CacheEntry, EntryInfo, EntryOptions};
pub use errors::{CacheError, Error, RecoveryHint, Result, SerializationOp};
pub use eviction::{
    create_eviction_strategy, EvictionCandidate, EvictionStrategy, EvictionStrategyKind,
    LruWeightedStrategy, SmartStrategy,
};
pub use flyweight::{
    ContentCategory, ContentFlyweight, FlyweightInfo, FlyweightRegistry, RegistryStats,
};
pub use hashing::{canonical_bytes, ContentHasher, Fingerprint, Sha256Hasher, Xxh3Hasher};
pub use manager::{CacheManager, CacheManagerBuilder, CacheStatistics, CacheStats, MemoryUsage};
