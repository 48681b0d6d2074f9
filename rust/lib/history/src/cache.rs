//! In-memory mirror of the newest value of each live key.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::engine::Engine;
use crate::error::HistoryError;
use crate::traits::{MapKey, MapValue};

/// Cache maps a user key to its decoded newest value.
#[derive(Debug, Clone)]
pub struct Cache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> Cache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: MapKey, V: MapValue> Cache<K, V> {
    /// Load the newest stored value of every key in `keys`.
    pub(crate) fn hydrate<'a>(
        engine: &Engine,
        keys: impl IntoIterator<Item = &'a K>,
    ) -> Result<Self, HistoryError>
    where
        K: 'a,
    {
        let mut cache = Self::new();
        for key in keys {
            let value: V = engine.past(key, 0)?;
            cache.insert(key.clone(), value);
        }
        debug!("hydrated cache with {} keys", cache.len());
        Ok(cache)
    }
}
