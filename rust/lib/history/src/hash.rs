//! Content hashing of keys into fixed-length storage identifiers.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of a hex-encoded [`KeyId`].
pub const KEY_ID_LEN: usize = 64;

/// Storage row key derived from a user key.
///
/// The id is the lowercase hex SHA-256 of the key's `Display` text, so two keys
/// with the same text representation address the same rows in every process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    pub fn of<K: fmt::Display + ?Sized>(key: &K) -> Self {
        let digest = Sha256::digest(key.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
