use rusqlite::{Connection, types::ValueRef};
use model::core::value::Value;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyMetadata {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<String>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyMetadata>,
    pub row_count: u64,
}

impl TableMetadata {
    /// Tables this table references through foreign keys.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.clone())
            .collect();
        tables.sort();
        tables.dedup();
        tables
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    names.collect()
}

pub fn table_metadata(conn: &Connection, table: &str) -> rusqlite::Result<TableMetadata> {
    let mut columns = Vec::new();
    let mut keyed: Vec<(i64, String)> = Vec::new();

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let pk_index: i64 = row.get(5)?;
        if pk_index > 0 {
            keyed.push((pk_index, name.clone()));
        }
        columns.push(name);
    }
    keyed.sort();

    let mut foreign_keys = Vec::new();
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        foreign_keys.push(ForeignKeyMetadata {
            referenced_table: row.get(2)?,
            column: row.get(3)?,
            referenced_column: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        });
    }

    let row_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;

    Ok(TableMetadata {
        name: table.to_string(),
        columns,
        primary_keys: keyed.into_iter().map(|(_, name)| name).collect(),
        foreign_keys,
        row_count: row_count.max(0) as u64,
    })
}

pub fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
