//! Storage plumbing shared by both container variants: opening the backing
//! store, the low-level write that also serves registry updates, and decoded
//! historical reads.

use std::fmt::Display;
use std::sync::Arc;

use history_sql::{SQLStore, SqliteStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codec;
use crate::config::{HistoryConfig, Location};
use crate::error::HistoryError;
use crate::hash::KeyId;
use crate::registry::{KeyRegistry, RESERVED_KEY};
use crate::table::{HISTORY_DICT_TABLE, SqlVersionStore};
use crate::traits::VersionStore;

pub(crate) struct Engine {
    store: Box<dyn VersionStore>,
    registry_id: KeyId,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry_id", &self.registry_id)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Open `table` at the configured location, creating it with an empty
    /// registry on first use.
    pub(crate) fn open(config: &HistoryConfig, table: &'static str) -> Result<Self, HistoryError> {
        let sql: Arc<dyn SQLStore> = match &config.location {
            Location::Memory => Arc::new(SqliteStore::open_in_memory()?),
            Location::File(path) => {
                Arc::new(SqliteStore::open_with_journal(path, config.journal_mode)?)
            }
        };
        Self::with_store(Box::new(SqlVersionStore::new(sql, table)), &config.location)
    }

    pub(crate) fn with_store(
        store: Box<dyn VersionStore>,
        location: &Location,
    ) -> Result<Self, HistoryError> {
        let engine = Self {
            store,
            registry_id: KeyId::of(RESERVED_KEY),
        };

        if engine.store.ensure_schema()? {
            debug!("created a fresh history table in {}", location);
            engine.store_registry(&KeyRegistry::<String>::new())?;
        } else {
            debug!("found an existing history table in {}", location);
            if engine.store.count(&engine.registry_id)? == 0 {
                // First open was interrupted between creating the table and
                // seeding the registry.
                warn!("history table in {} has no key registry, seeding an empty one", location);
                engine.store_registry(&KeyRegistry::<String>::new())?;
            }
        }
        Ok(engine)
    }

    /// Append `value` as the newest version of `key`. No reserved-key check:
    /// registry updates go through here too.
    pub(crate) fn put<K, V>(&self, key: &K, value: &V) -> Result<(), HistoryError>
    where
        K: Display + ?Sized,
        V: Serialize + ?Sized,
    {
        self.put_id(&KeyId::of(key), value)
    }

    fn put_id<V: Serialize + ?Sized>(&self, id: &KeyId, value: &V) -> Result<(), HistoryError> {
        let blob = codec::encode(value)?;
        self.store.append(id, &blob)
    }

    /// Decoded value `depth` versions back from the newest, straight from storage.
    pub(crate) fn past<K, V>(&self, key: &K, depth: i64) -> Result<V, HistoryError>
    where
        K: Display + ?Sized,
        V: DeserializeOwned,
    {
        let blob = self
            .store
            .latest(&KeyId::of(key), depth)
            .map_err(|e| match e {
                HistoryError::NotFound(_) => {
                    HistoryError::NotFound(format!("no such key in history: {}", key))
                }
                other => other,
            })?;
        codec::decode(&blob)
    }

    pub(crate) fn load_registry<K: DeserializeOwned + PartialEq>(
        &self,
    ) -> Result<KeyRegistry<K>, HistoryError> {
        let blob = self.store.latest(&self.registry_id, 0)?;
        let keys: Vec<K> = codec::decode(&blob)?;
        Ok(KeyRegistry::from_keys(keys))
    }

    pub(crate) fn store_registry<K: Serialize>(
        &self,
        registry: &KeyRegistry<K>,
    ) -> Result<(), HistoryError> {
        self.put_id(&self.registry_id, registry)
    }

    /// Wipe every row, then record an empty registry as a new event.
    pub(crate) fn clear(&self) -> Result<(), HistoryError> {
        self.clear_rows()?;
        self.store_registry(&KeyRegistry::<String>::new())
    }

    /// Wipe every row, registry included. Callers must store a fresh registry
    /// afterwards.
    pub(crate) fn clear_rows(&self) -> Result<(), HistoryError> {
        self.store.clear_all()
    }

    pub(crate) fn versions<K: Display + ?Sized>(&self, key: &K) -> Result<u64, HistoryError> {
        self.store.count(&KeyId::of(key))
    }

    pub(crate) fn remove_rows<K: Display + ?Sized>(&self, key: &K) -> Result<u64, HistoryError> {
        let removed = self.store.remove_rows_for(&KeyId::of(key))?;
        debug!("removed {} stored versions of {}", removed, key);
        Ok(removed)
    }

    /// Keep the `keep` newest versions of every key (`0` is treated as `1`).
    pub(crate) fn trim(&self, keep: usize) -> Result<u64, HistoryError> {
        let keep = keep.max(1) as u64;
        let removed = self.store.trim(keep)?;
        debug!("trimmed history to {} versions per key, {} rows removed", keep, removed);
        Ok(removed)
    }
}
