use serde::{Deserialize, Serialize};
use std::fmt;

/// Secondary index declared on a target collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

/// Definition of a target collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSchema {
    /// Schema keyed on the conventional `PK`/`SK` pair.
    pub fn keyed(name: impl Into<String>) -> Self {
        CollectionSchema {
            name: name.into(),
            partition_key: "PK".to_string(),
            sort_key: Some("SK".to_string()),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Lifecycle state reported by the target store for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Active,
    Creating,
    Deleting,
    Missing,
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollectionStatus::Active => "active",
            CollectionStatus::Creating => "creating",
            CollectionStatus::Deleting => "deleting",
            CollectionStatus::Missing => "missing",
        };
        f.write_str(s)
    }
}
