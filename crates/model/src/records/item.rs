use crate::core::value::{AttributeMap, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary identity of a target item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// A target-store item: deterministic keys, an entity tag and free-form attributes.
///
/// Repeated writes of an item with the same `(pk, sk)` overwrite the stored copy,
/// which is what makes replayed groups idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "EntityType")]
    pub entity_type: String,
    #[serde(flatten)]
    pub attributes: AttributeMap,
}

impl Item {
    pub fn new(
        pk: impl Into<String>,
        sk: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Item {
            pk: pk.into(),
            sk: sk.into(),
            entity_type: entity_type.into(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey {
            pk: self.pk.clone(),
            sk: self.sk.clone(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_keys_beside_attributes() {
        let item = Item::new("ARTIST#1", "METADATA", "Artist").with("Name", "AC/DC");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["PK"], "ARTIST#1");
        assert_eq!(json["SK"], "METADATA");
        assert_eq!(json["EntityType"], "Artist");
        assert_eq!(json["Name"], "AC/DC");

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
