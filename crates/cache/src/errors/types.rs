//! Core error types for the cache

use std::path::PathBuf;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Error type for cache operations
///
/// Capacity is never an error: a full cache makes room by evicting.
#[derive(Debug)]
pub enum CacheError {
    /// A value could not be canonically serialized for fingerprinting
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Invalid budgets, strategy names or entry options
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// An eviction strategy was asked for more victims than it was given
    InvalidVictimCount {
        requested: usize,
        available: usize,
        recovery_hint: RecoveryHint,
    },

    /// I/O errors while loading configuration
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Use a default value instead
    UseDefault { value: String },

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Fix the offending value and retry
    FixInput { instructions: String },

    /// Update cache configuration
    UpdateConfiguration,

    /// Operation can be safely ignored
    Ignore,

    /// No automated recovery possible
    Manual { instructions: String },
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Canonicalize,
    Encode,
    Decode,
}

impl CacheError {
    /// Create a configuration error that asks the caller to update configuration
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }

    /// Create a serialization error for the given cache key
    #[must_use]
    pub fn serialization(
        key: impl Into<String>,
        operation: SerializationOp,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Serialization {
            key: key.into(),
            operation,
            source: source.into(),
            recovery_hint: RecoveryHint::FixInput {
                instructions: "Ensure the value serializes to JSON (map keys must be strings)"
                    .to_string(),
            },
        }
    }

    /// Attach the cache key to a serialization error raised without one
    #[must_use]
    pub fn with_key(mut self, cache_key: &str) -> Self {
        if let Self::Serialization { key, .. } = &mut self {
            if key.is_empty() {
                *key = cache_key.to_string();
            }
        }
        self
    }
}
