//! Immutable shared payloads

use crate::hashing::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of cached content
///
/// Purely descriptive: it feeds the per-category memory breakdown and never
/// takes part in deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentCategory {
    #[serde(rename = "db_query")]
    DatabaseQuery,
    #[serde(rename = "api_response")]
    ApiResponse,
    #[serde(rename = "computed_result")]
    ComputedResult,
    #[serde(rename = "file_content")]
    FileContent,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 4] = [
        ContentCategory::DatabaseQuery,
        ContentCategory::ApiResponse,
        ContentCategory::ComputedResult,
        ContentCategory::FileContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::DatabaseQuery => "db_query",
            ContentCategory::ApiResponse => "api_response",
            ContentCategory::ComputedResult => "computed_result",
            ContentCategory::FileContent => "file_content",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicated cached content
///
/// Two flyweights are considered equal when their fingerprints match; the
/// registry guarantees at most one live flyweight per fingerprint.
#[derive(Debug)]
pub struct ContentFlyweight<V> {
    category: ContentCategory,
    fingerprint: Fingerprint,
    size_bytes: u64,
    production_cost: f64,
    payload: V,
}

impl<V> ContentFlyweight<V> {
    pub(crate) fn new(
        category: ContentCategory,
        fingerprint: Fingerprint,
        size_bytes: u64,
        production_cost: f64,
        payload: V,
    ) -> Self {
        Self {
            category,
            fingerprint,
            size_bytes,
            production_cost,
            payload,
        }
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Size of the canonical serialization in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// How expensive the value was to produce; only used by eviction scoring
    pub fn production_cost(&self) -> f64 {
        self.production_cost
    }

    pub fn payload(&self) -> &V {
        &self.payload
    }
}

impl<V> PartialEq for ContentFlyweight<V> {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl<V> Eq for ContentFlyweight<V> {}
