use crate::{
    error::SourceError,
    source::{GroupSpec, SourceProvider},
};
use async_trait::async_trait;
use model::records::row::{Row, RowsByTable};

/// Source provider over tables held in memory.
pub struct MemorySource {
    identity: String,
    tables: RowsByTable,
    groups: Vec<GroupSpec>,
}

impl MemorySource {
    pub fn new(identity: impl Into<String>) -> Self {
        MemorySource {
            identity: identity.into(),
            tables: RowsByTable::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn with_group(mut self, group: GroupSpec) -> Self {
        self.groups.push(group);
        self
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn list_groups(&self) -> Result<Vec<GroupSpec>, SourceError> {
        for group in &self.groups {
            if let Some(missing) = group
                .all_tables()
                .into_iter()
                .find(|t| !self.tables.contains_key(t))
            {
                return Err(SourceError::InvalidGroup {
                    group: group.name.clone(),
                    reason: format!("table '{missing}' does not exist"),
                });
            }
        }
        Ok(self.groups.clone())
    }

    async fn get_rows(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SourceError::UnknownTable(table.to_string()))
    }

    async fn count_rows(&self, table: &str) -> Result<u64, SourceError> {
        self.tables
            .get(table)
            .map(|rows| rows.len() as u64)
            .ok_or_else(|| SourceError::UnknownTable(table.to_string()))
    }
}
