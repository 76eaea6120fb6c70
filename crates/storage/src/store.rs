//! The store interface and its SQLite implementation.

use crate::{ColumnType, Error, Record, Result, Schema, Value};
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A minimal relational store.
///
/// Filters select rows whose columns equal every pair in the filter; an
/// empty filter matches all rows. Rows come back with their columns in
/// schema declaration order.
pub trait Store: Send + Sync {
    /// Create a table if it does not already exist and register its schema.
    fn create_table(&self, name: &str, schema: &Schema) -> Result<()>;

    /// Insert a record. Every non-key column of the schema must be present.
    fn insert(&self, table: &str, record: &Record) -> Result<()>;

    /// Assign the columns of `record` on every row matching `filter`.
    fn update(&self, table: &str, record: &Record, filter: &Record) -> Result<usize>;

    /// Delete every row matching `filter`.
    fn delete(&self, table: &str, filter: &Record) -> Result<usize>;

    /// Return every row matching `filter`, in insertion order.
    fn select(&self, table: &str, filter: &Record) -> Result<Vec<Record>>;
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// SQLite-backed store.
///
/// A single connection guarded by a mutex, so every read and write is
/// serialized.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Connection,
    schemas: HashMap<String, Schema>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "SQLite store opened");
        Ok(Self::with_connection(conn))
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                schemas: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Poisoned)
    }
}

impl Inner {
    // Only names registered through `create_table` (and so validated) resolve.
    fn schema(&self, table: &str) -> Result<&Schema> {
        self.schemas
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }
}

/// Render `"a" = ?n AND "b" = ?n+1 ...`, numbering placeholders from `first`.
fn equality_clause(record: &Record, first: usize, separator: &str) -> String {
    record
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("\"{column}\" = ?{}", first + i))
        .collect::<Vec<_>>()
        .join(separator)
}

fn where_clause(filter: &Record, first: usize) -> String {
    if filter.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", equality_clause(filter, first, " AND "))
    }
}

impl Store for SqliteStore {
    fn create_table(&self, name: &str, schema: &Schema) -> Result<()> {
        schema.validate_names(name)?;
        let mut inner = self.lock()?;

        let columns = schema
            .columns()
            .iter()
            .map(|(column, ty)| format!("\"{column}\" {}", ty.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        inner
            .conn
            .execute_batch(&format!("CREATE TABLE IF NOT EXISTS \"{name}\" ({columns});"))?;
        inner.schemas.insert(name.to_string(), schema.clone());

        debug!(table = name, "Table ready");
        Ok(())
    }

    fn insert(&self, table: &str, record: &Record) -> Result<()> {
        let inner = self.lock()?;
        inner.schema(table)?.check_insert(table, record)?;

        let sql = if record.is_empty() {
            format!("INSERT INTO \"{table}\" DEFAULT VALUES")
        } else {
            let columns = record
                .iter()
                .map(|(column, _)| format!("\"{column}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=record.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("INSERT INTO \"{table}\" ({columns}) VALUES ({placeholders})")
        };
        inner
            .conn
            .execute(&sql, params_from_iter(record.iter().map(|(_, v)| v)))?;
        Ok(())
    }

    fn update(&self, table: &str, record: &Record, filter: &Record) -> Result<usize> {
        let inner = self.lock()?;
        let schema = inner.schema(table)?;
        schema.check_columns(table, record)?;
        schema.check_columns(table, filter)?;
        if record.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE \"{table}\" SET {}{}",
            equality_clause(record, 1, ", "),
            where_clause(filter, record.len() + 1),
        );
        let params = record.iter().chain(filter.iter()).map(|(_, v)| v);
        Ok(inner.conn.execute(&sql, params_from_iter(params))?)
    }

    fn delete(&self, table: &str, filter: &Record) -> Result<usize> {
        let inner = self.lock()?;
        inner.schema(table)?.check_columns(table, filter)?;

        let sql = format!("DELETE FROM \"{table}\"{}", where_clause(filter, 1));
        Ok(inner
            .conn
            .execute(&sql, params_from_iter(filter.iter().map(|(_, v)| v)))?)
    }

    fn select(&self, table: &str, filter: &Record) -> Result<Vec<Record>> {
        let inner = self.lock()?;
        let schema = inner.schema(table)?;
        schema.check_columns(table, filter)?;

        let columns = schema
            .columns()
            .iter()
            .map(|(column, _)| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM \"{table}\"{} ORDER BY rowid",
            where_clause(filter, 1)
        );

        let mut stmt = inner.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.iter().map(|(_, v)| v)), |row| {
            let mut record = Record::new();
            for (i, (column, ty)) in schema.columns().iter().enumerate() {
                let value = match ty {
                    ColumnType::PrimaryKey | ColumnType::Integer => {
                        Value::Integer(row.get::<_, i64>(i)?)
                    }
                    ColumnType::Text => Value::Text(row.get::<_, String>(i)?),
                };
                record.set(column.as_str(), value);
            }
            Ok(record)
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn people() -> Schema {
        Schema::new()
            .column("id", ColumnType::PrimaryKey)
            .column("name", ColumnType::Text)
            .column("level", ColumnType::Integer)
    }

    fn person(name: &str, level: i64) -> Record {
        Record::new().with("name", name).with("level", level)
    }

    #[test]
    fn test_crud() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_table("people", &people()).unwrap();

        store.insert("people", &person("alice", 1)).unwrap();
        store.insert("people", &person("bob", 2)).unwrap();
        store.insert("people", &person("carol", 2)).unwrap();

        let all = store.select("people", &Record::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].get_text("name"), Some("alice"));
        assert_eq!(all[0].get_integer("id"), Some(1));
        let order: Vec<_> = all[0].iter().map(|(c, _)| c).collect();
        assert_eq!(order, ["id", "name", "level"]);

        let updated = store
            .update(
                "people",
                &Record::new().with("level", 5),
                &Record::new().with("level", 2),
            )
            .unwrap();
        assert_eq!(updated, 2);

        let fives = store
            .select("people", &Record::new().with("level", 5))
            .unwrap();
        assert_eq!(fives.len(), 2);

        let both = store
            .select("people", &Record::new().with("name", "bob").with("level", 5))
            .unwrap();
        assert_eq!(both.len(), 1);

        let deleted = store
            .delete("people", &Record::new().with("name", "bob"))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.select("people", &Record::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_table("people", &people()).unwrap();
        store.insert("people", &person("alice", 1)).unwrap();
        store.create_table("people", &people()).unwrap();
        assert_eq!(store.select("people", &Record::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_unregistered_table_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.insert("ghosts", &Record::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownTable(_)));
    }

    #[test]
    fn test_bad_identifiers_never_reach_sql() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .create_table("x\"; DROP TABLE people; --", &people())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_values_are_bound_not_interpolated() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_table("people", &people()).unwrap();
        let tricky = "o'brien\" OR 1=1 --";
        store.insert("people", &person(tricky, 1)).unwrap();
        store.insert("people", &person("other", 1)).unwrap();

        let rows = store
            .select("people", &Record::new().with("name", tricky))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_text("name"), Some(tricky));
    }

    #[test]
    fn test_numeric_looking_text_stays_text() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_table("people", &people()).unwrap();
        store.insert("people", &person("007", 1)).unwrap();

        let rows = store
            .select("people", &Record::new().with("name", "007"))
            .unwrap();
        assert_eq!(rows[0].get_text("name"), Some("007"));
        assert!(store
            .select("people", &Record::new().with("name", "7"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_table("people", &people()).unwrap();
            store.insert("people", &person("alice", 1)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        store.create_table("people", &people()).unwrap();
        let rows = store.select("people", &Record::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_text("name"), Some("alice"));
    }
}
