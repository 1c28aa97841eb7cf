//! Multi-factor eviction

use crate::errors::Result;
use crate::eviction::traits::{highest_scoring, EvictionCandidate, EvictionStrategy};
use std::time::Instant;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Prefers evicting large, rarely read, cheap, low-priority entries, with a
/// penalty that grows with every idle hour
#[derive(Debug, Default, Clone, Copy)]
pub struct SmartStrategy;

impl SmartStrategy {
    /// `size / (accesses + 1) / (cost + 1) / (priority + 1) + idle_hours`
    pub fn score(candidate: &EvictionCandidate<'_>, now: Instant) -> f64 {
        let frequency = candidate.access_count as f64 + 1.0;
        let size_penalty = candidate.size_bytes as f64 / frequency;
        let cost_protection = 1.0 / (candidate.production_cost + 1.0);
        let priority_protection = 1.0 / (f64::from(candidate.priority) + 1.0);
        let recency_penalty = candidate.idle_secs(now) / SECONDS_PER_HOUR;

        size_penalty * cost_protection * priority_protection + recency_penalty
    }
}

impl EvictionStrategy for SmartStrategy {
    fn name(&self) -> &'static str {
        "smart"
    }

    fn select_victims(
        &self,
        candidates: &[EvictionCandidate<'_>],
        target_count: usize,
        now: Instant,
    ) -> Result<Vec<String>> {
        highest_scoring(candidates, target_count, |c| Self::score(c, now))
    }
}
