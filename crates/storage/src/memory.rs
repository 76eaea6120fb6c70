//! Process-local store with the same semantics as [`SqliteStore`](crate::SqliteStore).

use crate::{ColumnType, Error, Record, Result, Schema, Store, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory store. Contents are lost when the value is dropped.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

struct Table {
    schema: Schema,
    rows: Vec<Record>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>> {
        self.tables.lock().map_err(|_| Error::Poisoned)
    }
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> Result<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| Error::UnknownTable(name.to_string()))
}

impl Store for MemoryStore {
    fn create_table(&self, name: &str, schema: &Schema) -> Result<()> {
        schema.validate_names(name)?;
        self.lock()?.entry(name.to_string()).or_insert_with(|| Table {
            schema: schema.clone(),
            rows: Vec::new(),
            next_id: 1,
        });
        Ok(())
    }

    fn insert(&self, table: &str, record: &Record) -> Result<()> {
        let mut tables = self.lock()?;
        let t = table_mut(&mut tables, table)?;
        t.schema.check_insert(table, record)?;

        // Lay the row out in schema order, assigning keys that were not given.
        let mut row = Record::new();
        for (column, ty) in t.schema.columns() {
            let value = match (ty, record.get(column)) {
                (_, Some(value)) => value.clone(),
                (ColumnType::PrimaryKey, None) => Value::Integer(t.next_id),
                // check_insert guarantees required columns are present.
                (_, None) => continue,
            };
            if let (ColumnType::PrimaryKey, Value::Integer(id)) = (ty, &value) {
                t.next_id = t.next_id.max(id + 1);
            }
            row.set(column.as_str(), value);
        }
        t.rows.push(row);
        Ok(())
    }

    fn update(&self, table: &str, record: &Record, filter: &Record) -> Result<usize> {
        let mut tables = self.lock()?;
        let t = table_mut(&mut tables, table)?;
        t.schema.check_columns(table, record)?;
        t.schema.check_columns(table, filter)?;
        if record.is_empty() {
            return Ok(0);
        }

        let mut count = 0;
        for row in t.rows.iter_mut().filter(|row| row.matches(filter)) {
            for (column, value) in record.iter() {
                row.set(column, value.clone());
            }
            count += 1;
        }
        Ok(count)
    }

    fn delete(&self, table: &str, filter: &Record) -> Result<usize> {
        let mut tables = self.lock()?;
        let t = table_mut(&mut tables, table)?;
        t.schema.check_columns(table, filter)?;

        let before = t.rows.len();
        t.rows.retain(|row| !row.matches(filter));
        Ok(before - t.rows.len())
    }

    fn select(&self, table: &str, filter: &Record) -> Result<Vec<Record>> {
        let tables = self.lock()?;
        let t = tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        t.schema.check_columns(table, filter)?;

        Ok(t.rows
            .iter()
            .filter(|row| row.matches(filter))
            .cloned()
            .collect())
    }
}
