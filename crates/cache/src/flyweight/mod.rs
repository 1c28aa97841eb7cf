//! Deduplicated content flyweights and the registry that hands them out
//!
//! A [`ContentFlyweight`] is immutable and shared by every cache entry whose
//! value serializes to the same canonical bytes. The [`FlyweightRegistry`]
//! only holds weak references, so a flyweight is freed as soon as the last
//! entry referencing it goes away.

mod content;
mod registry;
mod stats;

pub use content::{ContentCategory, ContentFlyweight};
pub use registry::FlyweightRegistry;
pub use stats::{FlyweightInfo, RegistryStats};
