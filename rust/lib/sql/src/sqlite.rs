use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// SQLite journal mode applied to file-backed databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
}

impl JournalMode {
    /// Value for `PRAGMA journal_mode`.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
        }
    }

    /// Parse a case-insensitive mode name (`wal`, `delete`, `truncate`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wal" => Some(JournalMode::Wal),
            "delete" => Some(JournalMode::Delete),
            "truncate" => Some(JournalMode::Truncate),
            _ => None,
        }
    }
}

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// The connection runs in autocommit mode, so every `exec` is durable once it
/// returns. One store owns its connection for its whole lifetime; dropping the
/// store closes it.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path in WAL mode.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        Self::open_with_journal(path, JournalMode::Wal)
    }

    /// Open or create a SQLite database at the given path with an explicit
    /// journal mode.
    pub fn open_with_journal(path: &Path, mode: JournalMode) -> Result<Self, SQLError> {
        let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;

        // journal_mode reports the resulting mode as a row, so it cannot go
        // through execute().
        let applied: String = conn
            .query_row(
                &format!("PRAGMA journal_mode={};", mode.pragma_value()),
                [],
                |row| row.get(0),
            )
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        debug!("opened sqlite database {:?} (journal_mode={})", path, applied);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn to_sql(value: &Value) -> &dyn rusqlite::types::ToSql {
    match value {
        Value::Null => &rusqlite::types::Null,
        Value::Integer(i) => i,
        Value::Real(f) => f,
        Value::Text(s) => s,
        Value::Blob(b) => b,
    }
}

fn bind_params(params: &[Value]) -> Vec<&dyn rusqlite::types::ToSql> {
    params.iter().map(to_sql).collect()
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let bound = bind_params(params);

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(bound.as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let bound = bind_params(params);

        let affected = conn
            .execute(sql, bound.as_slice())
            .map_err(SQLError::execution)?;

        Ok(affected as u64)
    }
}

/// Extract a Value from a rusqlite row at a given column index, keeping the
/// storage class SQLite reports for it.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec("CREATE TABLE t (name TEXT, n INTEGER, data BLOB)", &[])
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query_preserve_storage_class() {
        let store = make_store();
        let affected = store
            .exec(
                "INSERT INTO t (name, n, data) VALUES (?1, ?2, ?3)",
                &[
                    Value::Text("a".into()),
                    Value::Integer(7),
                    Value::Blob(b"{\"x\":1}".to_vec()),
                ],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = store.query("SELECT name, n, data FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("name"), Some("a"));
        assert_eq!(rows[0].get_i64("n"), Some(7));
        // A blob that happens to be valid UTF-8 still comes back as a blob.
        assert_eq!(rows[0].get("data"), Some(&Value::Blob(b"{\"x\":1}".to_vec())));
        assert_eq!(rows[0].get_bytes("data"), Some(&b"{\"x\":1}"[..]));
    }

    #[test]
    fn null_column_is_null() {
        let store = make_store();
        store
            .exec("INSERT INTO t (name) VALUES (?1)", &[Value::Text("b".into())])
            .unwrap();
        let rows = store.query("SELECT n FROM t", &[]).unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Null));
        assert_eq!(rows[0].get_i64("n"), None);
    }

    #[test]
    fn has_table_reports_existence() {
        let store = make_store();
        assert!(store.has_table("t").unwrap());
        assert!(!store.has_table("missing").unwrap());
    }

    #[test]
    fn bad_sql_is_query_error() {
        let store = make_store();
        let err = store.query("SELEC nonsense", &[]).unwrap_err();
        assert!(matches!(err, SQLError::Query(_)));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let store = make_store();
        store
            .exec("CREATE UNIQUE INDEX idx_t_name ON t (name)", &[])
            .unwrap();
        store
            .exec("INSERT INTO t (name) VALUES ('dup')", &[])
            .unwrap();
        let err = store
            .exec("INSERT INTO t (name) VALUES ('dup')", &[])
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)), "got {:?}", err);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let store = SqliteStore::open_with_journal(&path, JournalMode::Delete).unwrap();
            store.exec("CREATE TABLE kept (v INTEGER)", &[]).unwrap();
            store.exec("INSERT INTO kept (v) VALUES (42)", &[]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store.query("SELECT v FROM kept", &[]).unwrap();
        assert_eq!(rows[0].get_i64("v"), Some(42));
    }

    #[test]
    fn journal_mode_parse() {
        assert_eq!(JournalMode::parse("WAL"), Some(JournalMode::Wal));
        assert_eq!(JournalMode::parse("delete"), Some(JournalMode::Delete));
        assert_eq!(JournalMode::parse("truncate"), Some(JournalMode::Truncate));
        assert_eq!(JournalMode::parse("memory"), None);
    }
}
