use connectors::source::GroupLayout;
use model::{
    core::value::Value,
    schema::collection::{CollectionSchema, IndexSpec},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Denormalizes one field from another table into the item.
///
/// The value of attribute `from` is looked up in `table` by column `key`, and
/// column `field` of the matching row is stored under `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSpec {
    pub name: String,
    pub from: String,
    pub table: String,
    pub key: String,
    pub field: String,
    /// Stored when the lookup misses; without it the attribute is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Nests the child rows of `table` whose `foreign_key` equals the item's
/// `local_key` as a list attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedSpec {
    pub name: String,
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
    /// Child columns to keep. All columns when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_attribute: Option<String>,
}

/// How the rows of one source table become target items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub table: String,
    pub entity_type: String,
    pub pk: String,
    pub sk: String,
    /// Extra templated attributes, e.g. secondary index keys.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub lookups: Vec<LookupSpec>,
    #[serde(default)]
    pub embeds: Vec<EmbedSpec>,
}

/// A logical target collection and the source tables feeding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// Collection base name; the configured table prefix is prepended.
    pub collection: String,
    pub entities: Vec<EntityMapping>,
    /// Tables read only for lookups and embeds.
    #[serde(default)]
    pub lookups: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl GroupConfig {
    pub fn entity_tables(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.entities
            .iter()
            .map(|e| e.table.clone())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    pub fn layout(&self) -> GroupLayout {
        GroupLayout {
            name: self.name.clone(),
            tables: self.entity_tables(),
            lookups: self.lookups.clone(),
        }
    }

    pub fn schema(&self, table_prefix: &str) -> CollectionSchema {
        self.indexes.iter().cloned().fold(
            CollectionSchema::keyed(format!("{table_prefix}{}", self.collection)),
            CollectionSchema::with_index,
        )
    }

    /// Checks that every referenced table is read by the group.
    pub fn validate(&self) -> Result<(), String> {
        if self.entities.is_empty() {
            return Err(format!("group '{}' has no entities", self.name));
        }
        if self.collection.trim().is_empty() {
            return Err(format!("group '{}' has an empty collection name", self.name));
        }

        let readable: BTreeSet<String> = self
            .entity_tables()
            .into_iter()
            .chain(self.lookups.iter().cloned())
            .collect();

        for entity in &self.entities {
            if entity.pk.trim().is_empty() || entity.sk.trim().is_empty() {
                return Err(format!(
                    "entity '{}' in group '{}' needs both pk and sk templates",
                    entity.table, self.name
                ));
            }
            let referenced = entity
                .lookups
                .iter()
                .map(|l| &l.table)
                .chain(entity.embeds.iter().map(|e| &e.table));
            for table in referenced {
                if !readable.contains(table) {
                    return Err(format!(
                        "entity '{}' in group '{}' references table '{table}' which the group does not read",
                        entity.table, self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupConfig {
        GroupConfig {
            name: "music_catalog".into(),
            collection: "MusicCatalog".into(),
            entities: vec![EntityMapping {
                table: "Album".into(),
                entity_type: "Album".into(),
                pk: "ALBUM#{AlbumId}".into(),
                sk: "METADATA".into(),
                attributes: BTreeMap::new(),
                lookups: vec![LookupSpec {
                    name: "ArtistName".into(),
                    from: "ArtistId".into(),
                    table: "Artist".into(),
                    key: "ArtistId".into(),
                    field: "Name".into(),
                    default: Some(Value::from("Unknown Artist")),
                }],
                embeds: vec![],
            }],
            lookups: vec![],
            indexes: vec![IndexSpec {
                name: "GSI1".into(),
                partition_key: "GSI1PK".into(),
                sort_key: Some("GSI1SK".into()),
            }],
        }
    }

    #[test]
    fn lookup_tables_must_be_read_by_the_group() {
        let mut group = group();
        assert!(group.validate().unwrap_err().contains("'Artist'"));

        group.lookups.push("Artist".into());
        assert!(group.validate().is_ok());
        assert_eq!(group.layout().tables, vec!["Album"]);
    }

    #[test]
    fn schema_carries_prefix_and_indexes() {
        let schema = group().schema("chinook_");
        assert_eq!(schema.name, "chinook_MusicCatalog");
        assert_eq!(schema.partition_key, "PK");
        assert_eq!(schema.indexes.len(), 1);
    }
}
