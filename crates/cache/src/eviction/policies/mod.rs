//! Eviction strategy implementations

mod lru;
mod smart;

pub use lru::LruWeightedStrategy;
pub use smart::SmartStrategy;
