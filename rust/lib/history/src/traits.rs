use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HistoryError;
use crate::hash::KeyId;

/// VersionStore is the append-only table of version records behind both
/// container variants.
///
/// For a fixed key id, versions start at 1 and each `append` stores
/// `1 + max(version)`. Rows are never updated in place; they leave the table
/// only through `clear_all`, `remove_rows_for` and `trim`.
pub trait VersionStore: Send + Sync {
    /// Create the table if it is absent. Returns true when it was created.
    fn ensure_schema(&self) -> Result<bool, HistoryError>;

    /// Append a new version for `id`, committed before returning.
    fn append(&self, id: &KeyId, payload: &[u8]) -> Result<(), HistoryError>;

    /// Payload `depth` versions back from the newest (0 = newest).
    ///
    /// `NotFound` when nothing is stored for `id`, `InsufficientHistory` when
    /// fewer than `depth + 1` versions exist, `InvalidArgument` for a negative
    /// depth.
    fn latest(&self, id: &KeyId, depth: i64) -> Result<Vec<u8>, HistoryError>;

    /// Number of stored versions for `id`.
    fn count(&self, id: &KeyId) -> Result<u64, HistoryError>;

    /// Remove every row for every key.
    fn clear_all(&self) -> Result<(), HistoryError>;

    /// Physically delete all versions of `id`. Returns the number of rows removed.
    fn remove_rows_for(&self, id: &KeyId) -> Result<u64, HistoryError>;

    /// Keep only the `keep` newest versions of every key. Returns the number of
    /// rows removed.
    fn trim(&self, keep: u64) -> Result<u64, HistoryError>;
}

/// Keys usable in a history container: serializable (they are stored in the
/// key registry) and printable (their text is what gets hashed).
pub trait MapKey: Serialize + DeserializeOwned + Display + Eq + Hash + Clone {}

impl<T> MapKey for T where T: Serialize + DeserializeOwned + Display + Eq + Hash + Clone {}

/// Values usable in a history container.
pub trait MapValue: Serialize + DeserializeOwned + Clone {}

impl<T> MapValue for T where T: Serialize + DeserializeOwned + Clone {}
