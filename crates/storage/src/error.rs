use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("missing required column {column} in table {table}")]
    MissingColumn { table: String, column: String },

    #[error("type mismatch for column {column} in table {table}: expected {expected}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: &'static str,
    },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
