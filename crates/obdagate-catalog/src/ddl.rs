//! Catalog read from SQL DDL (`CREATE TABLE ...`) text.

use std::path::{Path, PathBuf};

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::{SchemaCatalog, SchemaSnapshot, SchemaUnavailable};

/// Parse `CREATE TABLE` statements into a snapshot. Other statements are ignored.
pub fn parse_ddl(sql: &str) -> Result<SchemaSnapshot, SchemaUnavailable> {
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| SchemaUnavailable::new(format!("invalid DDL: {e}")))?;

    let mut snapshot = SchemaSnapshot::default();
    for stmt in statements {
        if let Statement::CreateTable { name, columns, .. } = stmt {
            // Unquoted, unqualified table name: `main."lab results"` -> `lab results`.
            let Some(table) = name.0.last().map(|ident| ident.value.clone()) else {
                continue;
            };
            let columns = columns.iter().map(|c| c.name.value.clone()).collect();
            snapshot.tables.insert(table, columns);
        }
    }
    Ok(snapshot)
}

/// A `.sql` schema file. Re-read and re-parsed on every call.
#[derive(Debug, Clone)]
pub struct DdlCatalog {
    path: PathBuf,
}

impl DdlCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaCatalog for DdlCatalog {
    fn list_tables(&self) -> Result<Vec<String>, SchemaUnavailable> {
        Ok(self.snapshot()?.tables.into_keys().collect())
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, SchemaUnavailable> {
        self.snapshot()?
            .tables
            .remove(table)
            .ok_or_else(|| SchemaUnavailable::new(format!("unknown table `{table}`")))
    }

    fn snapshot(&self) -> Result<SchemaSnapshot, SchemaUnavailable> {
        let sql = std::fs::read_to_string(&self.path)
            .map_err(|e| SchemaUnavailable::new(format!("{}: {e}", self.path.display())))?;
        parse_ddl(&sql)
    }
}
