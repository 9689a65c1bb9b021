use crate::error::SourceError;
use async_trait::async_trait;
use model::records::row::Row;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which source tables make up a group.
///
/// `tables` are the entity tables whose rows each become one target item;
/// `lookups` are read only to denormalize fields into those items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLayout {
    pub name: String,
    pub tables: Vec<String>,
    #[serde(default)]
    pub lookups: Vec<String>,
}

/// A group as reported by a source provider, with its dependency rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSpec {
    pub name: String,
    pub tables: Vec<String>,
    pub lookups: Vec<String>,
    /// Lower ranks have fewer unresolved foreign-key dependencies and go first.
    pub rank: usize,
}

impl GroupSpec {
    /// Every table that has to be materialized to transform this group.
    pub fn all_tables(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.tables
            .iter()
            .chain(self.lookups.iter())
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }
}

/// Read side of a migration: group discovery and one-shot table snapshots.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Name of the source dataset, recorded in the checkpoint.
    fn identity(&self) -> &str;

    async fn list_groups(&self) -> Result<Vec<GroupSpec>, SourceError>;

    /// Full, ordered contents of a table.
    async fn get_rows(&self, table: &str) -> Result<Vec<Row>, SourceError>;

    async fn count_rows(&self, table: &str) -> Result<u64, SourceError>;
}

/// Assigns each table the layer in which it becomes free of unresolved references.
///
/// `references` maps a table to the tables it points at. Tables referenced but not
/// listed as keys are ignored. A cycle places every remaining table in one layer.
pub fn dependency_ranks(references: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, usize> {
    let mut ranks = BTreeMap::new();
    let mut remaining: BTreeSet<&str> = references.keys().map(String::as_str).collect();
    let mut layer = 0;

    while !remaining.is_empty() {
        let mut ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|table| {
                references[*table]
                    .iter()
                    .all(|dep| dep == table || !remaining.contains(dep.as_str()))
            })
            .collect();

        if ready.is_empty() {
            ready = remaining.iter().copied().collect();
        }

        for table in ready {
            remaining.remove(table);
            ranks.insert(table.to_string(), layer);
        }
        layer += 1;
    }

    ranks
}

/// Rank of a group: the highest rank among its entity tables.
pub fn group_rank(layout: &GroupLayout, ranks: &BTreeMap<String, usize>) -> usize {
    layout
        .tables
        .iter()
        .filter_map(|t| ranks.get(t))
        .copied()
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(t, deps)| (t.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn ranks_follow_foreign_keys() {
        let ranks = dependency_ranks(&refs(&[
            ("Artist", &[]),
            ("Album", &["Artist"]),
            ("Track", &["Album", "Genre"]),
            ("Genre", &[]),
        ]));

        assert_eq!(ranks["Artist"], 0);
        assert_eq!(ranks["Genre"], 0);
        assert_eq!(ranks["Album"], 1);
        assert_eq!(ranks["Track"], 2);
    }

    #[test]
    fn self_reference_does_not_block() {
        let ranks = dependency_ranks(&refs(&[("Employee", &["Employee"])]));
        assert_eq!(ranks["Employee"], 0);
    }

    #[test]
    fn cycle_collapses_into_one_layer() {
        let ranks = dependency_ranks(&refs(&[("A", &["B"]), ("B", &["A"]), ("C", &[])]));
        assert_eq!(ranks["C"], 0);
        assert_eq!(ranks["A"], 1);
        assert_eq!(ranks["B"], 1);
    }

    #[test]
    fn all_tables_dedupes_lookups() {
        let spec = GroupSpec {
            name: "playlist".into(),
            tables: vec!["Playlist".into(), "Track".into()],
            lookups: vec!["Track".into(), "Album".into()],
            rank: 0,
        };
        assert_eq!(spec.all_tables(), vec!["Playlist", "Track", "Album"]);
    }
}
