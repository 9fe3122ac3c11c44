//! SQLite-backed catalog.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};

use crate::{SchemaCatalog, SchemaUnavailable};

/// Reads table metadata from a SQLite database file.
///
/// Each call opens its own read-only connection, so the catalog always
/// reflects the file as it is right now.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
}

impl SqliteCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SchemaUnavailable> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, err: rusqlite::Error) -> SchemaUnavailable {
    SchemaUnavailable::new(format!("{}: {err}", path.display()))
}

impl SchemaCatalog for SqliteCatalog {
    fn list_tables(&self) -> Result<Vec<String>, SchemaUnavailable> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .map_err(|e| unavailable(&self.path, e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| unavailable(&self.path, e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| unavailable(&self.path, e))
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, SchemaUnavailable> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| unavailable(&self.path, e))?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| unavailable(&self.path, e))?;
        let columns = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| unavailable(&self.path, e))?;
        // Every SQLite table has at least one column.
        if columns.is_empty() {
            return Err(SchemaUnavailable::new(format!(
                "{}: no such table `{table}`",
                self.path.display()
            )));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploads.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE patients (Age INTEGER, Status TEXT, Notes TEXT);
             CREATE TABLE \"lab results\" (\"Patient ID\" TEXT, value REAL);",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn lists_tables_and_ordered_columns() {
        let (_dir, path) = fixture();
        let catalog = SqliteCatalog::new(&path);
        assert_eq!(
            catalog.list_tables().unwrap(),
            vec!["lab results", "patients"]
        );
        assert_eq!(
            catalog.columns_of("patients").unwrap(),
            vec!["Age", "Status", "Notes"]
        );
        assert_eq!(
            catalog.columns_of("lab results").unwrap(),
            vec!["Patient ID", "value"]
        );
    }

    #[test]
    fn sees_tables_created_after_construction() {
        let (_dir, path) = fixture();
        let catalog = SqliteCatalog::new(&path);
        assert_eq!(catalog.list_tables().unwrap().len(), 2);
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE visits (id INTEGER)")
            .unwrap();
        assert_eq!(catalog.list_tables().unwrap().len(), 3);
    }

    #[test]
    fn missing_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::new(dir.path().join("missing.sqlite"));
        assert!(catalog.snapshot().is_err());
    }

    #[test]
    fn unknown_table_is_unavailable() {
        let (_dir, path) = fixture();
        assert!(SqliteCatalog::new(&path).columns_of("nope").is_err());
    }
}
