//! Strategy selection

use crate::errors::{CacheError, RecoveryHint, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::policies::{LruWeightedStrategy, SmartStrategy};
use super::traits::EvictionStrategy;

/// Built-in eviction strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategyKind {
    /// Recency weighted by frequency, priority and production cost
    #[default]
    #[serde(rename = "lru", alias = "lru_weighted")]
    LruWeighted,
    /// Size, cost, priority and idle hours combined
    Smart,
}

impl EvictionStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategyKind::LruWeighted => "lru",
            EvictionStrategyKind::Smart => "smart",
        }
    }
}

impl fmt::Display for EvictionStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionStrategyKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lru" | "lru_weighted" | "lru-weighted" => Ok(Self::LruWeighted),
            "smart" => Ok(Self::Smart),
            _ => Err(CacheError::Configuration {
                message: format!("Unknown eviction strategy: {s}"),
                recovery_hint: RecoveryHint::UseDefault {
                    value: "lru".to_string(),
                },
            }),
        }
    }
}

/// Instantiate a built-in strategy
pub fn create_eviction_strategy(kind: EvictionStrategyKind) -> Box<dyn EvictionStrategy> {
    match kind {
        EvictionStrategyKind::LruWeighted => Box::new(LruWeightedStrategy),
        EvictionStrategyKind::Smart => Box::new(SmartStrategy),
    }
}
