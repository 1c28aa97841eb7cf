//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => {
                if key.is_empty() {
                    write!(f, "Failed to {operation:?} cache value: {source}")
                } else {
                    write!(f, "Failed to {operation:?} cache value for '{key}': {source}")
                }
            }
            Self::Configuration { message, .. } => {
                write!(f, "Cache configuration error: {message}")
            }
            Self::InvalidVictimCount {
                requested,
                available,
                ..
            } => write!(
                f,
                "Eviction strategy asked for {requested} victims but only {available} entries are available"
            ),
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization { source, .. } => Some(source.as_ref()),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
