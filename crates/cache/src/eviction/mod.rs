//! Eviction strategies for budget enforcement
//!
//! A strategy is a pure selection function: given every current entry and a
//! victim count, it decides which keys go. The cache manager decides when to
//! evict and how many.

mod factory;
mod policies;
mod traits;

// Re-export public API
pub use factory::{create_eviction_strategy, EvictionStrategyKind};
pub use policies::{LruWeightedStrategy, SmartStrategy};
pub use traits::{EvictionCandidate, EvictionStrategy};
