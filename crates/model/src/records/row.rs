use crate::core::value::{AttributeMap, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source rows grouped by the table they were read from.
pub type RowsByTable = BTreeMap<String, Vec<Row>>;

/// One materialized source row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: AttributeMap,
}

impl Row {
    pub fn new(values: AttributeMap) -> Self {
        Row { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns the column value, treating a missing column as null.
    pub fn get_value(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }
}

impl From<AttributeMap> for Row {
    fn from(values: AttributeMap) -> Self {
        Row { values }
    }
}
