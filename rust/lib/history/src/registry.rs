//! The key registry: the ordered list of live keys, stored as versions of a
//! reserved key.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Key whose versions hold the registry. Not usable through the public surface.
pub const RESERVED_KEY: &str = "__list_of_currently_known_about_keys";

/// Reject the reserved registry key.
pub fn ensure_not_reserved<K: Display + ?Sized>(key: &K) -> Result<(), HistoryError> {
    if key.to_string() == RESERVED_KEY {
        return Err(HistoryError::InvalidArgument(format!(
            "'{}' is a reserved key",
            RESERVED_KEY
        )));
    }
    Ok(())
}

/// Ordered, duplicate-free list of live keys, in first-insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRegistry<K> {
    keys: Vec<K>,
}

impl<K> Default for KeyRegistry<K> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<K: PartialEq> KeyRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from stored keys. Later duplicates are dropped.
    pub fn from_keys(keys: impl IntoIterator<Item = K>) -> Self {
        let mut registry = Self::new();
        for key in keys {
            registry.insert(key);
        }
        registry
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Append `key` if it is not already registered. Returns true if it was added.
    pub fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Returns true if the key was registered.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.keys.iter().position(|k| k == key) {
            Some(idx) => {
                self.keys.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn into_keys(self) -> Vec<K> {
        self.keys
    }
}
