//! Error handling for the flyweight cache
//!
//! Every error carries a [`RecoveryHint`] so callers can decide whether to
//! fix their input, adjust configuration, or simply ignore the failure.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
