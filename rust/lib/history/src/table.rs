//! SQL-backed [`VersionStore`].

use std::sync::Arc;

use history_sql::{SQLStore, Value};
use tracing::debug;

use crate::error::HistoryError;
use crate::hash::KeyId;
use crate::traits::VersionStore;

/// Table behind [`crate::History`]. The suffix is the schema generation;
/// containers of a different variant or generation never share a table.
pub const HISTORY_TABLE: &str = "HISTORY_A_2_0";

/// Table behind [`crate::HistoryDict`].
pub const HISTORY_DICT_TABLE: &str = "HISTORY_B_2_0";

/// Statements for one history table, rendered once when the store is built.
struct Statements {
    create_table: String,
    create_index: String,
    insert_version: String,
    select_newest: String,
    count_versions: String,
    delete_all: String,
    delete_one: String,
    trim: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE {table} (
        key_id CHAR(64) NOT NULL,
        version INTEGER NOT NULL,
        payload BLOB NOT NULL)"
            ),
            create_index: format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_key_version
        ON {table} (key_id, version)"
            ),
            // Next version is computed inside the insert itself.
            insert_version: format!(
                "INSERT INTO {table} (key_id, version, payload)
        VALUES (?1,
                1 + (SELECT COALESCE(MAX(version), 0)
                     FROM {table}
                     WHERE key_id = ?1),
                ?2)"
            ),
            select_newest: format!(
                "SELECT payload
        FROM {table}
        WHERE key_id = ?1 ORDER BY version DESC LIMIT ?2"
            ),
            count_versions: format!("SELECT COUNT(*) AS n FROM {table} WHERE key_id = ?1"),
            delete_all: format!("DELETE FROM {table}"),
            delete_one: format!("DELETE FROM {table} WHERE key_id = ?1"),
            trim: format!(
                "DELETE FROM {table}
        WHERE version <= (SELECT MAX(newest.version)
                          FROM {table} AS newest
                          WHERE newest.key_id = {table}.key_id) - ?1"
            ),
        }
    }
}

/// SqlVersionStore keeps every version record in one table of a [`SQLStore`].
pub struct SqlVersionStore {
    sql: Arc<dyn SQLStore>,
    table: &'static str,
    statements: Statements,
}

impl SqlVersionStore {
    /// Store over `table`, one of [`HISTORY_TABLE`] or [`HISTORY_DICT_TABLE`].
    pub fn new(sql: Arc<dyn SQLStore>, table: &'static str) -> Self {
        Self {
            sql,
            table,
            statements: Statements::for_table(table),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

impl VersionStore for SqlVersionStore {
    fn ensure_schema(&self) -> Result<bool, HistoryError> {
        if self.sql.has_table(self.table)? {
            return Ok(false);
        }
        self.sql.exec(&self.statements.create_table, &[])?;
        self.sql.exec(&self.statements.create_index, &[])?;
        Ok(true)
    }

    fn append(&self, id: &KeyId, payload: &[u8]) -> Result<(), HistoryError> {
        self.sql.exec(
            &self.statements.insert_version,
            &[Value::Text(id.to_string()), Value::Blob(payload.to_vec())],
        )?;
        Ok(())
    }

    fn latest(&self, id: &KeyId, depth: i64) -> Result<Vec<u8>, HistoryError> {
        if depth < 0 {
            return Err(HistoryError::InvalidArgument(format!(
                "depth must be nonnegative, got {}",
                depth
            )));
        }
        let wanted = depth.saturating_add(1);
        let rows = self.sql.query(
            &self.statements.select_newest,
            &[Value::Text(id.to_string()), Value::Integer(wanted)],
        )?;

        let Some(oldest) = rows.last() else {
            return Err(HistoryError::NotFound(format!("no versions stored for {}", id)));
        };
        if (rows.len() as i64) < wanted {
            return Err(HistoryError::InsufficientHistory {
                available: rows.len() as u64,
                depth,
            });
        }
        oldest
            .get_bytes("payload")
            .map(<[u8]>::to_vec)
            .ok_or_else(|| HistoryError::Serialization(format!("missing payload for {}", id)))
    }

    fn count(&self, id: &KeyId) -> Result<u64, HistoryError> {
        let rows = self
            .sql
            .query(&self.statements.count_versions, &[Value::Text(id.to_string())])?;
        let n = rows.first().and_then(|r| r.get_i64("n")).unwrap_or(0);
        Ok(n.max(0) as u64)
    }

    fn clear_all(&self) -> Result<(), HistoryError> {
        let removed = self.sql.exec(&self.statements.delete_all, &[])?;
        debug!("cleared {} version rows from {}", removed, self.table);
        Ok(())
    }

    fn remove_rows_for(&self, id: &KeyId) -> Result<u64, HistoryError> {
        Ok(self.sql.exec(&self.statements.delete_one, &[Value::Text(id.to_string())])?)
    }

    fn trim(&self, keep: u64) -> Result<u64, HistoryError> {
        // Counts past i64::MAX keep everything anyway.
        let keep = i64::try_from(keep.max(1)).unwrap_or(i64::MAX);
        Ok(self.sql.exec(&self.statements.trim, &[Value::Integer(keep)])?)
    }
}
