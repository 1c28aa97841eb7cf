//! Recency-weighted LRU eviction

use crate::errors::Result;
use crate::eviction::traits::{highest_scoring, EvictionCandidate, EvictionStrategy};
use std::time::Instant;

/// Least-recently-used, weighted by access frequency, priority and cost
///
/// Evicts the entries with the highest [`EvictionCandidate::lru_score`]: long
/// idle, rarely read, low priority and cheap to recompute.
#[derive(Debug, Default, Clone, Copy)]
pub struct LruWeightedStrategy;

impl EvictionStrategy for LruWeightedStrategy {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn select_victims(
        &self,
        candidates: &[EvictionCandidate<'_>],
        target_count: usize,
        now: Instant,
    ) -> Result<Vec<String>> {
        highest_scoring(candidates, target_count, |c| c.lru_score(now))
    }
}
