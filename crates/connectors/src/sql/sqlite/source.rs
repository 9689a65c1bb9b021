use crate::{
    error::SourceError,
    source::{GroupLayout, GroupSpec, SourceProvider, dependency_ranks, group_rank},
    sql::sqlite::metadata::{self, TableMetadata, quote_ident, read_value},
};
use async_trait::async_trait;
use model::{core::value::AttributeMap, records::row::Row};
use rusqlite::{Connection, OpenFlags};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Read-only relational source over a SQLite database file.
///
/// A fresh connection is opened for every call so the provider can be shared
/// freely across tasks.
pub struct SqliteSource {
    path: PathBuf,
    identity: String,
    layouts: Vec<GroupLayout>,
}

impl SqliteSource {
    pub fn open(path: impl AsRef<Path>, layouts: Vec<GroupLayout>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }

        let identity = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(SqliteSource {
            path,
            identity,
            layouts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata for every user table in the database.
    pub async fn tables(&self) -> Result<Vec<TableMetadata>, SourceError> {
        self.blocking(|conn| {
            let names = metadata::table_names(conn)?;
            names
                .iter()
                .map(|name| metadata::table_metadata(conn, name).map_err(SourceError::from))
                .collect()
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, SourceError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            f(&conn)
        })
        .await
        .map_err(|e| SourceError::Task(e.to_string()))?
    }
}

fn ensure_table(conn: &Connection, table: &str) -> Result<(), SourceError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(SourceError::UnknownTable(table.to_string()))
    }
}

fn read_table(conn: &Connection, table: &str) -> Result<Vec<Row>, SourceError> {
    ensure_table(conn, table)?;
    let meta = metadata::table_metadata(conn, table)?;

    let order = if meta.primary_keys.is_empty() {
        "rowid".to_string()
    } else {
        meta.primary_keys
            .iter()
            .map(|key| quote_ident(key))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let sql = format!("SELECT * FROM {} ORDER BY {order}", quote_ident(table));

    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = AttributeMap::new();
        for (idx, column) in columns.iter().enumerate() {
            values.insert(column.clone(), read_value(row.get_ref(idx)?));
        }
        out.push(Row::new(values));
    }
    Ok(out)
}

#[async_trait]
impl SourceProvider for SqliteSource {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn list_groups(&self) -> Result<Vec<GroupSpec>, SourceError> {
        let tables = self.tables().await?;
        let known: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();

        let references: BTreeMap<String, Vec<String>> = tables
            .iter()
            .map(|t| (t.name.clone(), t.referenced_tables()))
            .collect();
        let ranks = dependency_ranks(&references);

        let mut specs = Vec::with_capacity(self.layouts.len());
        for layout in &self.layouts {
            if let Some(missing) = layout
                .tables
                .iter()
                .chain(layout.lookups.iter())
                .find(|t| !known.contains(t.as_str()))
            {
                return Err(SourceError::InvalidGroup {
                    group: layout.name.clone(),
                    reason: format!("table '{missing}' does not exist"),
                });
            }

            let rank = group_rank(layout, &ranks);
            debug!(group = %layout.name, rank, "Resolved group rank");
            specs.push(GroupSpec {
                name: layout.name.clone(),
                tables: layout.tables.clone(),
                lookups: layout.lookups.clone(),
                rank,
            });
        }

        Ok(specs)
    }

    async fn get_rows(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        let table = table.to_string();
        self.blocking(move |conn| read_table(conn, &table)).await
    }

    async fn count_rows(&self, table: &str) -> Result<u64, SourceError> {
        let table = table.to_string();
        self.blocking(move |conn| {
            ensure_table(conn, &table)?;
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&table)),
                [],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
