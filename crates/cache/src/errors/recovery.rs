//! Recovery utilities for cache errors

use super::types::{CacheError, RecoveryHint};

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Serialization { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. }
            | Self::InvalidVictimCount { recovery_hint, .. }
            | Self::Io { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Whether the error was caused by the caller's input or setup rather than
    /// by the cache itself
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Serialization { .. } | Self::Configuration { .. } | Self::InvalidVictimCount { .. }
        )
    }

    /// Check if this error indicates a configuration problem
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
            || matches!(self.recovery_hint(), RecoveryHint::UpdateConfiguration)
    }
}
