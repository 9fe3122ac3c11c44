//! Relational schema catalog for obdagate
//!
//! The mapping engine only ever needs two questions answered about the
//! relational store: which tables exist, and which columns (in store order)
//! each one has. Adapters:
//! - `SqliteCatalog`: live SQLite database file
//! - `DuckDbCatalog`: live DuckDB database file (`duckdb` feature)
//! - `DdlCatalog`: `CREATE TABLE` statements in a `.sql` file
//! - `InMemoryCatalog`: fixed tables (tests, embedding)
//!
//! Nothing is cached. Every call goes back to the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ddl;
#[cfg(feature = "duckdb")]
pub mod duckdb;
pub mod sqlite;

pub use ddl::DdlCatalog;
#[cfg(feature = "duckdb")]
pub use self::duckdb::DuckDbCatalog;
pub use sqlite::SqliteCatalog;

/// The store could not be read. Fatal for the current operation.
#[derive(Debug, Error)]
#[error("schema unavailable: {message}")]
pub struct SchemaUnavailable {
    pub message: String,
}

impl SchemaUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait SchemaCatalog {
    fn list_tables(&self) -> Result<Vec<String>, SchemaUnavailable>;

    /// Column names of `table` in the store's column order.
    fn columns_of(&self, table: &str) -> Result<Vec<String>, SchemaUnavailable>;

    /// Read every table and its columns. Any failure discards the whole read,
    /// so callers never work against a half-read schema.
    fn snapshot(&self) -> Result<SchemaSnapshot, SchemaUnavailable> {
        let mut tables = BTreeMap::new();
        for table in self.list_tables()? {
            let columns = self.columns_of(&table)?;
            tables.insert(table, columns);
        }
        tracing::debug!(tables = tables.len(), "schema snapshot read");
        Ok(SchemaSnapshot { tables })
    }
}

/// Point-in-time view of the catalog: table name -> ordered column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, Vec<String>>,
}

impl SchemaSnapshot {
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<T, C> FromIterator<(T, Vec<C>)> for SchemaSnapshot
where
    T: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, Vec<C>)>>(iter: I) -> Self {
        Self {
            tables: iter
                .into_iter()
                .map(|(t, cols)| (t.into(), cols.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

/// Fixed set of tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    snapshot: SchemaSnapshot,
}

impl InMemoryCatalog {
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.snapshot.tables.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

impl SchemaCatalog for InMemoryCatalog {
    fn list_tables(&self) -> Result<Vec<String>, SchemaUnavailable> {
        Ok(self.snapshot.tables.keys().cloned().collect())
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, SchemaUnavailable> {
        self.snapshot
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaUnavailable::new(format!("unknown table `{table}`")))
    }

    fn snapshot(&self) -> Result<SchemaSnapshot, SchemaUnavailable> {
        Ok(self.snapshot.clone())
    }
}
