use async_trait::async_trait;
use connectors::{
    error::TargetError,
    memory::{source::MemorySource, target::MemoryTargetStore},
    source::GroupSpec,
    target::TargetStore,
};
use engine_core::{
    retry::RetryPolicy,
    state::{CheckpointStore, MigrationStatus},
};
use engine_processing::{
    consumer::BatchWriter, error::TransformError, provisioning::Provisioner, transform::Transform,
};
use engine_runtime::execution::{GroupPlan, MigrationCoordinator};
use model::{
    records::{
        item::Item,
        row::{Row, RowsByTable},
    },
    schema::collection::{CollectionSchema, CollectionStatus},
};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

/// The three groups used by the resume and end-to-end scenarios.
pub const SIZED_GROUPS: [(&str, usize); 3] = [("A", 20), ("B", 50), ("C", 100)];

pub fn table_for(group: &str) -> String {
    format!("T_{group}")
}

pub fn collection_for(group: &str) -> String {
    format!("coll_{group}")
}

/// A source with one table per group, `size` rows each.
pub fn sized_source(groups: &[(&str, usize)]) -> MemorySource {
    groups.iter().fold(MemorySource::new("sized.db"), |source, (name, size)| {
        let rows = (1..=*size)
            .map(|i| Row::default().with("Id", i as i64).with("Group", *name))
            .collect();
        source.with_table(&table_for(name), rows).with_group(GroupSpec {
            name: name.to_string(),
            tables: vec![table_for(name)],
            lookups: vec![],
            rank: 0,
        })
    })
}

/// One item per row of `table`, keyed by the row id.
pub fn item_per_row(table: String) -> Arc<dyn Transform> {
    Arc::new(move |rows: &RowsByTable| -> Result<Vec<Item>, TransformError> {
        let source = rows
            .get(&table)
            .ok_or_else(|| TransformError::MissingTable(table.clone()))?;
        Ok(source
            .iter()
            .map(|row| {
                Item::new(format!("{table}#{}", row.get_value("Id")), "METADATA", "Record")
                    .with("Group", row.get_value("Group"))
            })
            .collect())
    })
}

pub fn coordinator(
    checkpoint: &Path,
    source: MemorySource,
    target: Arc<dyn TargetStore>,
    groups: &[(&str, usize)],
    batch_size: usize,
) -> MigrationCoordinator {
    let writer = BatchWriter::new(target.clone(), batch_size, RetryPolicy::immediate(3));
    let provisioner = Provisioner::new(target, Duration::from_millis(1), Duration::from_secs(2));

    groups.iter().fold(
        MigrationCoordinator::new(
            Arc::new(source),
            CheckpointStore::new(checkpoint),
            writer,
            provisioner,
        ),
        |c, (name, _)| {
            c.with_group(
                *name,
                GroupPlan::new(
                    CollectionSchema::keyed(collection_for(name)),
                    item_per_row(table_for(name)),
                ),
            )
        },
    )
}

/// Target wrapper that re-reads the checkpoint file before every batch and
/// records any progress invariant it finds broken.
pub struct CheckpointProbe {
    inner: MemoryTargetStore,
    checkpoint: PathBuf,
    violations: Mutex<Vec<String>>,
    observations: Mutex<usize>,
}

impl CheckpointProbe {
    pub fn new(inner: MemoryTargetStore, checkpoint: impl Into<PathBuf>) -> Self {
        CheckpointProbe {
            inner,
            checkpoint: checkpoint.into(),
            violations: Mutex::new(Vec::new()),
            observations: Mutex::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryTargetStore {
        &self.inner
    }

    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().unwrap().clone()
    }

    pub fn observations(&self) -> usize {
        *self.observations.lock().unwrap()
    }

    fn observe(&self) {
        let Ok(Some(run)) = CheckpointStore::new(&self.checkpoint).load() else {
            return;
        };
        *self.observations.lock().unwrap() += 1;

        let mut violations = self.violations.lock().unwrap();
        for group in run.groups.values() {
            if group.migrated_records > group.total_records {
                violations.push(format!("{} migrated past its total", group.name));
            }
            // Empty groups read 0/0 before they complete.
            let finished = group.migrated_records == group.total_records;
            let completed = group.status == MigrationStatus::Completed;
            if finished != completed && !(group.total_records == 0 && !completed) {
                violations.push(format!(
                    "{} is {} with {}/{} records",
                    group.name, group.status, group.migrated_records, group.total_records
                ));
            }
        }
    }
}

#[async_trait]
impl TargetStore for CheckpointProbe {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), TargetError> {
        self.inner.ensure_collection(schema).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), TargetError> {
        self.inner.delete_collection(name).await
    }

    async fn describe_status(&self, name: &str) -> Result<CollectionStatus, TargetError> {
        self.inner.describe_status(name).await
    }

    async fn batch_put(&self, collection: &str, items: &[Item]) -> Result<Vec<Item>, TargetError> {
        self.observe();
        self.inner.batch_put(collection, items).await
    }

    async fn item_count(&self, collection: &str) -> Result<u64, TargetError> {
        self.inner.item_count(collection).await
    }

    async fn scan(&self, collection: &str, limit: Option<usize>) -> Result<Vec<Item>, TargetError> {
        self.inner.scan(collection, limit).await
    }
}
