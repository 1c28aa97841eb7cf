//! Registry statistics and diagnostics

use super::ContentCategory;
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time registry statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    /// Flyweights currently alive
    pub total_flyweights: usize,
    /// Flyweights created over the registry's lifetime
    pub total_flyweights_ever_created: u64,
    /// Created flyweights that are no longer alive
    pub flyweights_reclaimed: u64,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    /// Live flyweight bytes per content category
    pub memory_by_type: BTreeMap<ContentCategory, u64>,
    /// Percentage of created flyweights that have been reclaimed
    pub reclamation_efficiency: f64,
}

/// Diagnostic view of one live flyweight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlyweightInfo {
    /// First 16 hex characters of the fingerprint
    pub fingerprint: String,
    pub category: ContentCategory,
    pub size_bytes: u64,
    pub production_cost: f64,
    /// Strong references at the time of the snapshot
    pub strong_refs: usize,
}
