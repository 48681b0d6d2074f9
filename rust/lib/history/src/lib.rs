//! A persistent, versioned key/value mapping.
//!
//! Every write appends an immutable snapshot to a SQLite table; reads return
//! the newest snapshot or any earlier one by depth. Two containers share the
//! storage layer, each with its own table: [`History`] caches values once at open, while
//! [`HistoryDict`] keeps a cache that always matches the live keyspace and
//! supports removing keys.

pub mod cache;
pub mod codec;
pub mod config;
mod engine;
pub mod error;
pub mod hash;
pub mod history;
pub mod history_dict;
pub mod registry;
pub mod table;
pub mod traits;

pub use config::{DeletePolicy, HistoryConfig, JournalMode, Location};
pub use error::HistoryError;
pub use hash::KeyId;
pub use history::History;
pub use history_dict::HistoryDict;
pub use registry::{KeyRegistry, RESERVED_KEY};
pub use table::{HISTORY_DICT_TABLE, HISTORY_TABLE, SqlVersionStore};
pub use traits::{MapKey, MapValue, VersionStore};
