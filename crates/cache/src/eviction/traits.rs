//! Core eviction strategy trait definition

use crate::errors::{CacheError, RecoveryHint, Result};
use std::time::Instant;

/// Borrowed view of an entry's eviction-relevant state
#[derive(Debug, Clone, Copy)]
pub struct EvictionCandidate<'a> {
    pub key: &'a str,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    pub priority: u32,
    pub size_bytes: u64,
    pub production_cost: f64,
}

impl EvictionCandidate<'_> {
    /// Seconds since last access
    pub fn idle_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.last_accessed_at)
            .as_secs_f64()
    }

    /// `idle / (accesses + 1) / (priority + 1) / (cost + 1)`
    pub fn lru_score(&self, now: Instant) -> f64 {
        let frequency = self.access_count as f64 + 1.0;
        (self.idle_secs(now) / frequency)
            * (1.0 / (f64::from(self.priority) + 1.0))
            * (1.0 / (self.production_cost + 1.0))
    }
}

/// Eviction strategy trait
pub trait EvictionStrategy: Send + Sync {
    /// Strategy name for logs and stats
    fn name(&self) -> &'static str;

    /// Pick exactly `target_count` keys to evict
    ///
    /// Candidates arrive in the cache's insertion order; equal scores keep
    /// that order so selection is reproducible. Asking for more victims than
    /// candidates is an error.
    fn select_victims(
        &self,
        candidates: &[EvictionCandidate<'_>],
        target_count: usize,
        now: Instant,
    ) -> Result<Vec<String>>;
}

/// Keys of the `target_count` highest-scoring candidates, stable on ties
pub(crate) fn highest_scoring<F>(
    candidates: &[EvictionCandidate<'_>],
    target_count: usize,
    score: F,
) -> Result<Vec<String>>
where
    F: Fn(&EvictionCandidate<'_>) -> f64,
{
    if target_count > candidates.len() {
        return Err(CacheError::InvalidVictimCount {
            requested: target_count,
            available: candidates.len(),
            recovery_hint: RecoveryHint::FixInput {
                instructions: "Request at most as many victims as there are entries".to_string(),
            },
        });
    }

    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, score(candidate)))
        .collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(scored
        .into_iter()
        .take(target_count)
        .map(|(index, _)| candidates[index].key.to_string())
        .collect())
}
