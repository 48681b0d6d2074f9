use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A row returned from a SQL query — column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a byte column by name. Text columns are returned as their UTF-8 bytes,
    /// since SQLite happily stores a blob-typed payload as TEXT when a writer
    /// bound a string.
    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name) {
            Some(Value::Blob(b)) => Some(b.as_slice()),
            Some(Value::Text(s)) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

/// SQLStore is the narrow SQL surface the history engine needs from an
/// embedded database: durable tables, commit-per-statement, and queries that
/// return rows.
pub trait SQLStore: Send + Sync {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE/DDL) and return affected row count.
    /// The statement is committed before this returns.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Whether a table with the given name exists.
    fn has_table(&self, name: &str) -> Result<bool, SQLError> {
        let rows = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Value::Text(name.to_string())],
        )?;
        Ok(!rows.is_empty())
    }
}
