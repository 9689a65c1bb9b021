use model::{
    core::value::Value,
    records::row::{Row, RowsByTable},
};
use std::collections::HashMap;

/// Read-only index over materialized rows, keyed by `(table, column)`.
///
/// Built once per transform invocation and passed by reference; it borrows
/// the rows it indexes and is never mutated after construction.
#[derive(Debug, Default)]
pub struct LookupIndex<'a> {
    columns: HashMap<(String, String), HashMap<String, Vec<&'a Row>>>,
}

impl<'a> LookupIndex<'a> {
    pub fn build<'k, I>(rows: &'a RowsByTable, keys: I) -> Self
    where
        I: IntoIterator<Item = (&'k str, &'k str)>,
    {
        let mut columns = HashMap::new();
        for (table, column) in keys {
            let slot = (table.to_string(), column.to_string());
            if columns.contains_key(&slot) {
                continue;
            }

            let mut by_value: HashMap<String, Vec<&'a Row>> = HashMap::new();
            for row in rows.get(table).map(Vec::as_slice).unwrap_or_default() {
                if let Some(key) = row.get(column).and_then(Value::key_string) {
                    by_value.entry(key).or_default().push(row);
                }
            }
            columns.insert(slot, by_value);
        }
        LookupIndex { columns }
    }

    /// Every row of `table` whose `column` equals `value`, in source order.
    pub fn all(&self, table: &str, column: &str, value: &Value) -> &[&'a Row] {
        let Some(key) = value.key_string() else {
            return &[];
        };
        self.columns
            .get(&(table.to_string(), column.to_string()))
            .and_then(|by_value| by_value.get(&key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First row of `table` whose `column` equals `value`.
    pub fn first(&self, table: &str, column: &str, value: &Value) -> Option<&'a Row> {
        self.all(table, column, value).first().copied()
    }
}
