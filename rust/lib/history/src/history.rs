//! Eager single-shot cache variant.

use tracing::debug;

use crate::cache::Cache;
use crate::config::{DeletePolicy, HistoryConfig, Location};
use crate::engine::Engine;
use crate::error::HistoryError;
use crate::registry::{KeyRegistry, ensure_not_reserved};
use crate::table::HISTORY_TABLE;
use crate::traits::{MapKey, MapValue};

/// History is a persistent mapping where every `put` appends a new version.
///
/// Values are cached once, when the container is opened. Keyspace queries
/// (`len`, `keys`, `contains_key`) read the stored key registry, so they see
/// keys written through other handles to the same file, but `get` answers from
/// the cache whenever it can and may return a value that another handle has
/// since replaced. Use [`History::past`] for a read that always goes to
/// storage, or [`crate::HistoryDict`] for a container whose cache is the
/// authority for its keyspace.
///
/// The key `__list_of_currently_known_about_keys` is reserved.
#[derive(Debug)]
pub struct History<K = String, V = serde_json::Value> {
    engine: Engine,
    cache: Cache<K, V>,
    delete_policy: DeletePolicy,
}

impl<K: MapKey, V: MapValue> History<K, V> {
    /// Open or create a container at `location` with default options.
    pub fn open(location: impl Into<Location>) -> Result<Self, HistoryError> {
        Self::open_with(HistoryConfig::new(location))
    }

    pub fn open_with(config: HistoryConfig) -> Result<Self, HistoryError> {
        let engine = Engine::open(&config, HISTORY_TABLE)?;
        let registry: KeyRegistry<K> = engine.load_registry()?;
        let cache = Cache::hydrate(&engine, registry.iter())?;
        Ok(Self {
            engine,
            cache,
            delete_policy: config.delete_policy,
        })
    }

    /// Newest value of a live key.
    ///
    /// A key missing from the cache but live in the stored registry is read
    /// from storage and cached.
    pub fn get(&mut self, key: &K) -> Result<V, HistoryError> {
        ensure_not_reserved(key)?;
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }
        if !self.registry()?.contains(key) {
            return Err(HistoryError::NotFound(key.to_string()));
        }
        let value: V = self.engine.past(key, 0)?;
        self.cache.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Retrieve a past state of the value for `key`, bypassing the cache.
    ///
    /// `depth` counts back from the newest version: `0` is the latest, `5`
    /// the fifth most recent.
    pub fn past(&self, key: &K, depth: i64) -> Result<V, HistoryError> {
        ensure_not_reserved(key)?;
        self.engine.past(key, depth)
    }

    /// Store a new version of `key`.
    pub fn put(&mut self, key: K, value: V) -> Result<(), HistoryError> {
        ensure_not_reserved(&key)?;
        self.engine.put(&key, &value)?;

        let mut registry = self.registry()?;
        if registry.insert(key.clone()) {
            self.engine.store_registry(&registry)?;
        }
        self.cache.insert(key, value);
        Ok(())
    }

    /// Remove a live key, as allowed by the configured [`DeletePolicy`].
    ///
    /// With the default policy this always fails with `NotImplemented` for a
    /// live key and changes nothing.
    pub fn delete(&mut self, key: &K) -> Result<(), HistoryError> {
        ensure_not_reserved(key)?;
        let mut registry = self.registry()?;
        if !registry.contains(key) {
            return Err(HistoryError::NotFound(key.to_string()));
        }
        match self.delete_policy {
            DeletePolicy::Unsupported => Err(HistoryError::NotImplemented(
                "delete is not supported by this container".to_string(),
            )),
            DeletePolicy::RetainHistory => {
                registry.remove(key);
                self.engine.store_registry(&registry)?;
                self.cache.remove(key);
                debug!("deleted {} from the keyspace, stored versions kept", key);
                Ok(())
            }
        }
    }

    /// Live keys in registry order.
    pub fn keys(&self) -> Result<Vec<K>, HistoryError> {
        Ok(self.registry()?.into_keys())
    }

    /// Live keys paired with their newest values.
    pub fn items(&mut self) -> Result<Vec<(K, V)>, HistoryError> {
        let keys = self.keys()?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(&key)?;
            items.push((key, value));
        }
        Ok(items)
    }

    pub fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.registry()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, HistoryError> {
        Ok(self.registry()?.is_empty())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, HistoryError> {
        Ok(self.registry()?.contains(key))
    }

    /// Number of stored versions of `key`, live or not.
    pub fn versions(&self, key: &K) -> Result<u64, HistoryError> {
        ensure_not_reserved(key)?;
        self.engine.versions(key)
    }

    /// Delete every version of every key and reset the registry.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.engine.clear()?;
        self.cache.clear();
        Ok(())
    }

    /// Keep at most `n` versions of every key. `n < 1` is treated as 1.
    /// Returns the number of versions removed.
    pub fn trim(&mut self, n: usize) -> Result<u64, HistoryError> {
        self.engine.trim(n)
    }

    fn registry(&self) -> Result<KeyRegistry<K>, HistoryError> {
        self.engine.load_registry()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use serde_json::{Value, json};

    use super::*;
    use crate::registry::RESERVED_KEY;

    const OBJ_ID_LEN: usize = 36;

    fn make_history() -> History {
        History::open(":memory:").unwrap()
    }

    #[test]
    fn put_then_past() {
        let mut h = make_history();
        let run_id = "a".repeat(OBJ_ID_LEN);

        let config1 = json!({"plot_x": "long", "plot_y": "island"});
        h.put(run_id.clone(), config1.clone()).unwrap();
        assert_eq!(h.past(&run_id, 0).unwrap(), config1);

        let config2 = json!({"plot_x": "new", "plot_y": "york"});
        h.put(run_id.clone(), config2.clone()).unwrap();
        assert_eq!(h.past(&run_id, 0).unwrap(), config2);
        assert_eq!(h.get(&run_id).unwrap(), config2);
        assert_eq!(h.past(&run_id, 1).unwrap(), config1);
    }

    #[test]
    fn clear_forgets_keys() {
        let mut h = make_history();
        h.put("hi".into(), json!("mom")).unwrap();
        h.clear().unwrap();
        assert!(matches!(h.past(&"hi".into(), 0), Err(HistoryError::NotFound(_))));
        assert!(matches!(h.get(&"hi".into()), Err(HistoryError::NotFound(_))));
        assert_eq!(h.len().unwrap(), 0);
    }

    #[test]
    fn negative_depth_fails() {
        let mut h = make_history();
        let err = h.past(&"test".into(), -1).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidArgument(_)));

        h.put("test".into(), json!(1)).unwrap();
        let err = h.past(&"test".into(), -1).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidArgument(_)));
    }

    #[test]
    fn depth_beyond_history_fails() {
        let mut h = make_history();
        h.put("cats".into(), json!(123)).unwrap();
        assert!(matches!(
            h.past(&"cats".into(), 1),
            Err(HistoryError::InsufficientHistory { available: 1, depth: 1 })
        ));
        h.put("cats".into(), json!(456)).unwrap();
        assert_eq!(h.past(&"cats".into(), 1).unwrap(), json!(123));
    }

    #[test]
    fn integer_keys() {
        let mut h: History<i64, String> = History::open(":memory:").unwrap();
        h.put(123, "aardvark".into()).unwrap();
        assert_eq!(h.get(&123).unwrap(), "aardvark");
        assert_eq!(h.keys().unwrap(), vec![123]);
    }

    #[test]
    fn reserved_key_is_protected() {
        let mut h = make_history();
        let reserved = RESERVED_KEY.to_string();
        assert!(matches!(h.get(&reserved), Err(HistoryError::InvalidArgument(_))));
        assert!(matches!(
            h.put(reserved.clone(), json!("aardvark")),
            Err(HistoryError::InvalidArgument(_))
        ));
        assert!(matches!(h.past(&reserved, 0), Err(HistoryError::InvalidArgument(_))));
        assert!(!h.contains_key(&reserved).unwrap());
    }

    #[test]
    fn iteration_yields_each_key_with_its_value() {
        let mut h = make_history();
        for k in ["a", "b", "c", "d"] {
            h.put(k.to_string(), json!(k)).unwrap();
        }
        assert_eq!(h.len().unwrap(), 4);
        assert_eq!(h.keys().unwrap(), vec!["a", "b", "c", "d"]);

        let items = h.items().unwrap();
        let seen: HashSet<String> = items.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(seen.len(), 4);
        for (k, v) in items {
            assert_eq!(v, Value::String(k));
        }
    }

    #[test]
    fn rewriting_a_key_does_not_grow_the_keyspace() {
        let mut h = make_history();
        h.put("a".into(), json!(1)).unwrap();
        h.put("a".into(), json!(2)).unwrap();
        assert_eq!(h.len().unwrap(), 1);
        assert_eq!(h.versions(&"a".into()).unwrap(), 2);
    }

    #[test]
    fn delete_unsupported_by_default_and_changes_nothing() {
        let mut h = make_history();
        h.put("a".into(), json!(123)).unwrap();

        let err = h.delete(&"a".into()).unwrap_err();
        assert!(matches!(err, HistoryError::NotImplemented(_)));
        assert!(h.contains_key(&"a".into()).unwrap());
        assert_eq!(h.get(&"a".into()).unwrap(), json!(123));

        let err = h.delete(&"aardvark".into()).unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
    }

    #[test]
    fn delete_retaining_history() {
        let config = HistoryConfig::default().with_delete_policy(DeletePolicy::RetainHistory);
        let mut h: History = History::open_with(config).unwrap();
        h.put("a".into(), json!(123)).unwrap();
        h.put("a".into(), json!(456)).unwrap();
        h.put("b".into(), json!(1)).unwrap();

        h.delete(&"a".into()).unwrap();
        assert!(!h.contains_key(&"a".into()).unwrap());
        assert_eq!(h.keys().unwrap(), vec!["b"]);
        assert!(matches!(h.get(&"a".into()), Err(HistoryError::NotFound(_))));
        // Stored versions remain readable as an audit trail.
        assert_eq!(h.past(&"a".into(), 1).unwrap(), json!(123));

        // Re-adding continues the old numbering.
        h.put("a".into(), json!(789)).unwrap();
        assert_eq!(h.past(&"a".into(), 1).unwrap(), json!(456));
        assert_eq!(h.keys().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn trim_keeps_newest() {
        let mut h = make_history();
        for i in 0..5 {
            h.put("a".into(), json!(i)).unwrap();
        }
        h.put("b".into(), json!("only")).unwrap();

        // Three old versions of "a" plus the oldest of three registry versions.
        assert_eq!(h.trim(2).unwrap(), 4);
        assert_eq!(h.versions(&"a".into()).unwrap(), 2);
        assert_eq!(h.past(&"a".into(), 1).unwrap(), json!(3));
        assert!(matches!(
            h.past(&"a".into(), 2),
            Err(HistoryError::InsufficientHistory { .. })
        ));
        assert_eq!(h.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(h.get(&"b".into()).unwrap(), json!("only"));
    }

    #[test]
    fn reopen_sees_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let mut h1: History = History::open(path.as_path()).unwrap();
            h1.put("aardvark".into(), json!("ants")).unwrap();
        }
        let mut h2: History = History::open(path.as_path()).unwrap();
        assert_eq!(h2.get(&"aardvark".into()).unwrap(), json!("ants"));
        assert_eq!(h2.len().unwrap(), 1);
    }

    #[test]
    fn cache_may_be_stale_against_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let mut h1: History = History::open(path.as_path()).unwrap();
        h1.put("a".into(), json!(1)).unwrap();

        let mut h2: History = History::open(path.as_path()).unwrap();
        h2.put("a".into(), json!(2)).unwrap();
        h2.put("b".into(), json!(3)).unwrap();

        // Keyspace comes from storage, values from the cache where present.
        assert_eq!(h1.len().unwrap(), 2);
        assert_eq!(h1.get(&"a".into()).unwrap(), json!(1));
        assert_eq!(h1.past(&"a".into(), 0).unwrap(), json!(2));
        // A key never seen by h1 is read through on first access.
        assert_eq!(h1.get(&"b".into()).unwrap(), json!(3));
    }

    #[test]
    fn open_under_missing_directory_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("history.db");
        let err = History::<String, Value>::open(path.as_path()).unwrap_err();
        assert!(matches!(err, HistoryError::Storage(_)), "got {:?}", err);
    }

    #[test]
    fn unencodable_value_is_rejected_without_side_effects() {
        let mut h: History<String, BTreeMap<Vec<u8>, i32>> = History::open(":memory:").unwrap();
        let value = BTreeMap::from([(vec![1u8, 2], 3)]);

        let err = h.put("k".into(), value).unwrap_err();
        assert!(matches!(err, HistoryError::Serialization(_)), "got {:?}", err);
        assert_eq!(h.len().unwrap(), 0);
        assert!(!h.contains_key(&"k".into()).unwrap());
        assert_eq!(h.versions(&"k".into()).unwrap(), 0);
    }

    #[test]
    fn trim_with_huge_count_removes_nothing() {
        let mut h = make_history();
        h.put("a".into(), json!(1)).unwrap();
        h.put("a".into(), json!(2)).unwrap();
        assert_eq!(h.trim(usize::MAX).unwrap(), 0);
        assert_eq!(h.past(&"a".into(), 1).unwrap(), json!(1));
    }
}
