//! Minimal relational storage for the permission system.
//!
//! This crate provides the small table abstraction the permission engine
//! persists through: create a table from a [`Schema`], then insert, update,
//! delete and select [`Record`]s by column equality.
//!
//! # Core Concepts
//!
//! ## Store
//!
//! The [`Store`] trait is the whole interface. Filters passed to `update`,
//! `delete` and `select` match rows whose columns equal every pair in the
//! filter; an empty filter matches every row.
//!
//! ## Backends
//!
//! - [`SqliteStore`] — a single SQLite connection behind a mutex. Use
//!   [`SqliteStore::open`] for a database file that survives restarts.
//! - [`MemoryStore`] — process-local tables with identical semantics.
//!
//! Both validate writes against the registered schema: unknown tables and
//! columns, missing required columns and mistyped values are rejected
//! instead of being coerced.
//!
//! # Example
//!
//! ```no_run
//! use storage::{ColumnType, Record, Schema, SqliteStore, Store};
//!
//! let store = SqliteStore::open("permission.db")?;
//! store.create_table(
//!     "superusers",
//!     &Schema::new()
//!         .column("id", ColumnType::PrimaryKey)
//!         .column("user_id", ColumnType::Text),
//! )?;
//!
//! store.insert("superusers", &Record::new().with("user_id", "10001"))?;
//! let rows = store.select("superusers", &Record::new().with("user_id", "10001"))?;
//! assert_eq!(rows.len(), 1);
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod memory;
mod record;
mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use record::{ColumnType, Record, Schema, Value};
pub use store::{SqliteStore, Store};
