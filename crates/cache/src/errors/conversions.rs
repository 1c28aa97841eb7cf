//! Error conversion utilities

use super::types::{CacheError, RecoveryHint, SerializationOp};

/// Convert serde_json errors to cache errors
impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Encode,
            source: Box::new(error),
            recovery_hint: RecoveryHint::FixInput {
                instructions: "Check JSON format and data types".to_string(),
            },
        }
    }
}
