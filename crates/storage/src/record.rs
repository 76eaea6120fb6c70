//! Column types, schemas and records shared by every backend.

use crate::{Error, Result};

/// The type of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-increment integer primary key, assigned by the store.
    PrimaryKey,
    /// Required text.
    Text,
    /// Required integer.
    Integer,
}

impl ColumnType {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            ColumnType::PrimaryKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
            ColumnType::Text => "TEXT NOT NULL",
            ColumnType::Integer => "INTEGER NOT NULL",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnType::PrimaryKey | ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Text, Value::Text(_))
        )
    }

    fn name(self) -> &'static str {
        match self {
            ColumnType::PrimaryKey | ColumnType::Integer => "integer",
            ColumnType::Text => "text",
        }
    }
}

/// Ordered column declarations for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Declaration order is the order of returned rows.
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, ty)| *ty)
    }

    pub(crate) fn validate_names(&self, table: &str) -> Result<()> {
        validate_identifier(table)?;
        for (column, _) in &self.columns {
            validate_identifier(column)?;
        }
        Ok(())
    }

    /// Check that every column in `record` exists and carries a value of the right type.
    pub(crate) fn check_columns(&self, table: &str, record: &Record) -> Result<()> {
        for (column, value) in record.iter() {
            let ty = self
                .column_type(column)
                .ok_or_else(|| Error::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })?;
            if !ty.accepts(value) {
                return Err(Error::TypeMismatch {
                    table: table.to_string(),
                    column: column.to_string(),
                    expected: ty.name(),
                });
            }
        }
        Ok(())
    }

    /// Like [`Schema::check_columns`], additionally requiring every non-key column.
    pub(crate) fn check_insert(&self, table: &str, record: &Record) -> Result<()> {
        self.check_columns(table, record)?;
        for (column, ty) in &self.columns {
            if *ty != ColumnType::PrimaryKey && record.get(column).is_none() {
                return Err(Error::MissingColumn {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Integer(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// An ordered set of column/value pairs.
///
/// Used for inserted records, update assignments, equality filters and
/// returned rows alike. An empty record used as a filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any previous value for it.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            Value::Text(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    pub fn get_integer(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            Value::Text(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when every pair in `filter` is present in this record.
    pub fn matches(&self, filter: &Record) -> bool {
        filter.iter().all(|(c, v)| self.get(c) == Some(v))
    }
}

pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .column("id", ColumnType::PrimaryKey)
            .column("name", ColumnType::Text)
            .column("level", ColumnType::Integer)
    }

    #[test]
    fn test_record_set_replaces_in_place() {
        let mut record = Record::new().with("a", 1).with("b", "x");
        record.set("a", 2);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get_integer("a"), Some(2));
        assert_eq!(record.iter().next().map(|(c, _)| c), Some("a"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let row = Record::new().with("name", "alice");
        assert!(row.matches(&Record::new()));
        assert!(row.matches(&Record::new().with("name", "alice")));
        assert!(!row.matches(&Record::new().with("name", "bob")));
        assert!(!row.matches(&Record::new().with("other", "alice")));
    }

    #[test]
    fn test_check_insert_rejects_bad_records() {
        let schema = schema();
        let ok = Record::new().with("name", "n").with("level", 1);
        assert!(schema.check_insert("t", &ok).is_ok());

        let missing = Record::new().with("name", "n");
        assert!(matches!(
            schema.check_insert("t", &missing),
            Err(Error::MissingColumn { .. })
        ));

        let wrong_type = Record::new().with("name", 5).with("level", 1);
        assert!(matches!(
            schema.check_insert("t", &wrong_type),
            Err(Error::TypeMismatch { .. })
        ));

        let unknown = ok.with("extra", "x");
        assert!(matches!(
            schema.check_insert("t", &unknown),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier("group_perm").is_ok());
        assert!(validate_identifier("_t1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
    }
}
