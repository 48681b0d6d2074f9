//! Coherent-cache variant with key removal.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use crate::cache::Cache;
use crate::config::{HistoryConfig, Location};
use crate::engine::Engine;
use crate::error::HistoryError;
use crate::registry::{KeyRegistry, ensure_not_reserved};
use crate::table::HISTORY_DICT_TABLE;
use crate::traits::{MapKey, MapValue};

/// HistoryDict is a persistent mapping with history whose in-memory cache is
/// always exactly the live keyspace.
///
/// Every `insert` appends a new version to storage; `get` never touches
/// storage. Values handed out by `get` are owned copies. Values changed in
/// place through [`HistoryDict::get_mut`] reach storage on
/// [`close`](HistoryDict::close), when the container is dropped with
/// `flush_on_drop` enabled, or on an explicit [`flush`](HistoryDict::flush).
/// Keys that were never touched through `get_mut` are not written again.
///
/// One handle per backing file is assumed to be the only writer.
///
/// The key `__list_of_currently_known_about_keys` is reserved.
pub struct HistoryDict<K = String, V = serde_json::Value>
where
    K: MapKey,
    V: MapValue,
{
    engine: Engine,
    registry: KeyRegistry<K>,
    cache: Cache<K, V>,
    // Keys whose cached value may differ from their newest stored version.
    dirty: HashSet<K>,
    flush_on_drop: bool,
}

impl<K: MapKey, V: MapValue> HistoryDict<K, V> {
    /// Open or create a container at `location` with default options.
    pub fn open(location: impl Into<Location>) -> Result<Self, HistoryError> {
        Self::open_with(HistoryConfig::new(location))
    }

    pub fn open_with(config: HistoryConfig) -> Result<Self, HistoryError> {
        let engine = Engine::open(&config, HISTORY_DICT_TABLE)?;
        Self::from_engine(engine, config.flush_on_drop)
    }

    fn from_engine(engine: Engine, flush_on_drop: bool) -> Result<Self, HistoryError> {
        let registry: KeyRegistry<K> = engine.load_registry()?;
        let cache = Cache::hydrate(&engine, registry.iter())?;
        Ok(Self {
            engine,
            registry,
            cache,
            dirty: HashSet::new(),
            flush_on_drop,
        })
    }

    /// Newest value of a live key.
    pub fn get(&self, key: &K) -> Result<V, HistoryError> {
        ensure_not_reserved(key)?;
        self.cache
            .get(key)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(key.to_string()))
    }

    /// Mutable access to the cached value of a live key. Changes are stored
    /// as a new version on close, drop or flush.
    pub fn get_mut(&mut self, key: &K) -> Result<&mut V, HistoryError> {
        ensure_not_reserved(key)?;
        let value = self
            .cache
            .get_mut(key)
            .ok_or_else(|| HistoryError::NotFound(key.to_string()))?;
        self.dirty.insert(key.clone());
        Ok(value)
    }

    /// Retrieve a past state of the value for `key`, always from storage.
    ///
    /// `depth` counts back from the newest version: `0` is the latest, `5`
    /// the fifth most recent.
    pub fn past(&self, key: &K, depth: i64) -> Result<V, HistoryError> {
        ensure_not_reserved(key)?;
        self.engine.past(key, depth)
    }

    /// Store a new version of `key`.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), HistoryError> {
        ensure_not_reserved(&key)?;
        self.engine.put(&key, &value)?;
        self.dirty.remove(&key);

        if !self.cache.contains(&key) {
            let mut registry = self.registry.clone();
            registry.insert(key.clone());
            self.engine.store_registry(&registry)?;
            self.registry = registry;
        }
        self.cache.insert(key, value);
        Ok(())
    }

    /// Remove a live key and erase its stored history. Returns its last value.
    ///
    /// The cached value is written as one last version first, so storage
    /// matches the cache at the moment the key leaves the registry.
    pub fn remove(&mut self, key: &K) -> Result<V, HistoryError> {
        ensure_not_reserved(key)?;
        if !self.cache.contains(key) {
            return Err(HistoryError::NotFound(key.to_string()));
        }
        self.flush_key(key)?;
        self.dirty.remove(key);

        let mut registry = self.registry.clone();
        registry.remove(key);
        self.engine.store_registry(&registry)?;
        self.registry = registry;

        let value = self
            .cache
            .remove(key)
            .ok_or_else(|| HistoryError::NotFound(key.to_string()))?;
        self.engine.remove_rows(key)?;
        Ok(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.cache.contains(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Live keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.registry.iter()
    }

    /// Live keys and their newest values, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.registry
            .iter()
            .filter_map(|key| self.cache.get(key).map(|value| (key, value)))
    }

    /// Number of stored versions of `key`.
    pub fn versions(&self, key: &K) -> Result<u64, HistoryError> {
        ensure_not_reserved(key)?;
        self.engine.versions(key)
    }

    /// Delete every version of every key and reset the registry.
    ///
    /// Once the rows are gone the in-memory keyspace is empty too, even when
    /// recording the fresh registry fails.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.engine.clear_rows()?;
        self.registry.clear();
        self.cache.clear();
        self.dirty.clear();
        self.engine.store_registry(&self.registry)
    }

    /// Checkpoint: write the cached value of every live key as a new version,
    /// modified or not.
    pub fn flush(&mut self) -> Result<(), HistoryError> {
        for key in self.registry.iter() {
            self.flush_key(key)?;
        }
        self.dirty.clear();
        debug!("flushed {} keys", self.registry.len());
        Ok(())
    }

    /// Keep at most `n` versions of every key. `n < 1` is treated as 1.
    /// Returns the number of versions removed.
    pub fn trim(&mut self, n: usize) -> Result<u64, HistoryError> {
        self.engine.trim(n)
    }

    /// Store values changed through `get_mut` and release the backing store,
    /// reporting any write failure.
    pub fn close(mut self) -> Result<(), HistoryError> {
        self.flush_on_drop = false;
        self.flush_modified()
    }

    fn flush_modified(&mut self) -> Result<(), HistoryError> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        for key in self.registry.iter().filter(|key| self.dirty.contains(*key)) {
            self.flush_key(key)?;
        }
        debug!("flushed {} modified keys", self.dirty.len());
        self.dirty.clear();
        Ok(())
    }

    fn flush_key(&self, key: &K) -> Result<(), HistoryError> {
        let value = self
            .cache
            .get(key)
            .ok_or_else(|| HistoryError::NotFound(key.to_string()))?;
        self.engine.put(key, value)
    }
}

impl<K: MapKey, V: MapValue> Drop for HistoryDict<K, V> {
    fn drop(&mut self) {
        if self.flush_on_drop {
            if let Err(e) = self.flush_modified() {
                warn!("failed to flush history on drop: {}", e);
            }
        }
    }
}

impl<K, V> fmt::Debug for HistoryDict<K, V>
where
    K: MapKey + fmt::Debug,
    V: MapValue + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
