//! Content fingerprinting for flyweight deduplication
//!
//! Values are first reduced to a canonical byte form (compact JSON with map
//! keys in sorted order), then digested by a pluggable [`ContentHasher`].
//! Two values share a flyweight exactly when their fingerprints match.

mod finite;

use crate::errors::{CacheError, Result, SerializationOp};
use finite::FiniteCheck;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// Digest of a value's canonical serialization
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Full lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// First `chars` hex characters, for logs and diagnostics
    pub fn short(&self, chars: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(chars);
        hex
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short(16))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Digest algorithm used to fingerprint canonical bytes
pub trait ContentHasher: Send + Sync {
    /// Short algorithm name, used in logs
    fn name(&self) -> &'static str;

    fn digest(&self, canonical: &[u8]) -> Fingerprint;
}

/// SHA-256 fingerprints (the default)
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, canonical: &[u8]) -> Fingerprint {
        let digest = Sha256::digest(canonical);
        Fingerprint::from_bytes(digest.as_slice())
    }
}

/// 128-bit XXH3 fingerprints, much faster but not collision resistant
/// against adversarial input
#[derive(Debug, Default, Clone, Copy)]
pub struct Xxh3Hasher;

impl ContentHasher for Xxh3Hasher {
    fn name(&self) -> &'static str {
        "xxh3-128"
    }

    fn digest(&self, canonical: &[u8]) -> Fingerprint {
        Fingerprint::from_bytes(xxh3_128(canonical).to_be_bytes().as_slice())
    }
}

/// Serialize a value to its canonical byte form
///
/// Going through `serde_json::Value` orders object keys, so two maps with the
/// same contents encode identically regardless of insertion order. Values
/// holding `NaN` or an infinity are rejected since JSON has no encoding for
/// them.
pub fn canonical_bytes<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>> {
    value.serialize(FiniteCheck).map_err(|e| {
        CacheError::serialization(String::new(), SerializationOp::Canonicalize, e)
    })?;
    let tree = serde_json::to_value(value).map_err(|e| {
        CacheError::serialization(String::new(), SerializationOp::Canonicalize, e)
    })?;
    serde_json::to_vec(&tree)
        .map_err(|e| CacheError::serialization(String::new(), SerializationOp::Encode, e))
}
