use crate::error::MigrationError;
use connectors::source::{GroupSpec, SourceProvider};
use engine_core::{
    error::CheckpointError,
    metrics::MetricsSnapshot,
    retry::RetryError,
    state::{CheckpointStore, MigrationStatus},
};
use engine_processing::{
    consumer::BatchWriter, provisioning::Provisioner, retry::classify_source_error,
    transform::Transform,
};
use model::{
    records::{item::Item, row::RowsByTable},
    schema::collection::CollectionSchema,
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How one group is written: its target collection and the transform that
/// turns the group's rows into items.
#[derive(Clone)]
pub struct GroupPlan {
    pub schema: CollectionSchema,
    pub transform: Arc<dyn Transform>,
}

impl GroupPlan {
    pub fn new(schema: CollectionSchema, transform: Arc<dyn Transform>) -> Self {
        GroupPlan { schema, transform }
    }

    pub fn collection(&self) -> &str {
        &self.schema.name
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: MigrationStatus,
    pub groups: Vec<String>,
    pub migrated_records: u64,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone)]
pub enum ResumeOutcome {
    /// No checkpoint exists.
    NothingToResume,
    AlreadyComplete { run_id: String },
    Resumed(RunSummary),
}

/// Drives a migration run: orders groups, moves each one through
/// read → transform → write, and keeps the checkpoint in step.
///
/// Groups and batches are processed strictly one at a time. A checkpoint
/// update is persisted only after the batch it reflects was acknowledged.
pub struct MigrationCoordinator {
    source: Arc<dyn SourceProvider>,
    checkpoint: CheckpointStore,
    writer: BatchWriter,
    provisioner: Provisioner,
    plans: BTreeMap<String, GroupPlan>,
}

impl MigrationCoordinator {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        checkpoint: CheckpointStore,
        writer: BatchWriter,
        provisioner: Provisioner,
    ) -> Self {
        MigrationCoordinator {
            source,
            checkpoint,
            writer,
            provisioner,
            plans: BTreeMap::new(),
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, plan: GroupPlan) -> Self {
        self.plans.insert(name.into(), plan);
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn checkpoint_mut(&mut self) -> &mut CheckpointStore {
        &mut self.checkpoint
    }

    /// Starts a new run over `selection` (every planned group when `None`).
    ///
    /// Refuses to overwrite a resumable run unless `force_recreate` is set, in
    /// which case target collections are also dropped and recreated. A
    /// corrupted checkpoint is an error either way; it has to be reset first.
    pub async fn start(
        &mut self,
        selection: Option<&[String]>,
        force_recreate: bool,
    ) -> Result<RunSummary, MigrationError> {
        let existing = self.checkpoint.load()?;
        if !force_recreate
            && let Some(run) = existing
            && matches!(run.status, MigrationStatus::InProgress | MigrationStatus::Paused)
        {
            return Err(MigrationError::IncompleteRun {
                run_id: run.id,
                status: run.status.to_string(),
            });
        }

        let ordered = self.ordered_groups(selection).await?;
        let sizes: Vec<(String, u64)> = ordered
            .iter()
            .map(|(group, total)| (group.name.clone(), *total))
            .collect();
        let groups: Vec<GroupSpec> = ordered.into_iter().map(|(group, _)| group).collect();

        let run_id = Uuid::new_v4().to_string();
        self.checkpoint
            .initialize(&run_id, self.source.identity(), &sizes)?;
        info!(
            run_id = %run_id,
            source = self.source.identity(),
            groups = groups.len(),
            force_recreate,
            "Starting migration run"
        );

        self.provision_groups(&groups, force_recreate).await?;
        self.process_groups(&groups).await?;
        self.finish()
    }

    /// Reprocesses every group of the persisted run that is not COMPLETED.
    ///
    /// Groups restart from their first row; stable item keys turn replayed
    /// writes into overwrites.
    pub async fn resume(&mut self) -> Result<ResumeOutcome, MigrationError> {
        let Some(run) = self.checkpoint.load()? else {
            info!("No migration run to resume");
            return Ok(ResumeOutcome::NothingToResume);
        };
        if run.is_complete() {
            info!(run_id = %run.id, "Migration run already completed");
            return Ok(ResumeOutcome::AlreadyComplete { run_id: run.id });
        }
        if run.status == MigrationStatus::Paused {
            self.checkpoint.resume_run()?;
        }

        let pending: Vec<String> = run
            .ordered_groups()
            .filter(|g| !g.is_complete())
            .map(|g| g.name.clone())
            .collect();
        info!(run_id = %run.id, groups = ?pending, "Resuming migration run");

        let specs: BTreeMap<String, GroupSpec> = self
            .source
            .list_groups()
            .await?
            .into_iter()
            .map(|g| (g.name.clone(), g))
            .collect();
        let groups = pending
            .iter()
            .map(|name| {
                specs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MigrationError::UnknownGroup(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.process_groups(&groups).await?;
        self.finish().map(ResumeOutcome::Resumed)
    }

    /// Groups with their expected totals, in processing order: dependency rank
    /// first, then row count.
    async fn ordered_groups(
        &self,
        selection: Option<&[String]>,
    ) -> Result<Vec<(GroupSpec, u64)>, MigrationError> {
        let available = self.source.list_groups().await?;

        let chosen: Vec<GroupSpec> = match selection {
            None => available
                .into_iter()
                .filter(|g| self.plans.contains_key(&g.name))
                .collect(),
            Some(names) => {
                let mut chosen = Vec::with_capacity(names.len());
                for name in names {
                    let spec = available
                        .iter()
                        .find(|g| &g.name == name)
                        .filter(|g| self.plans.contains_key(&g.name))
                        .ok_or_else(|| MigrationError::UnknownGroup(name.clone()))?;
                    if !chosen.iter().any(|g: &GroupSpec| g.name == spec.name) {
                        chosen.push(spec.clone());
                    }
                }
                chosen
            }
        };

        let mut ordered = Vec::with_capacity(chosen.len());
        for group in chosen {
            let total = self.expected_total(&group).await?;
            ordered.push((group, total));
        }
        ordered.sort_by_key(|(group, total)| (group.rank, *total));

        Ok(ordered)
    }

    /// Every entity row yields one item, so the expected total is the entity row count.
    async fn expected_total(&self, group: &GroupSpec) -> Result<u64, MigrationError> {
        let mut total = 0;
        for table in &group.tables {
            total += self.source.count_rows(table).await?;
        }
        Ok(total)
    }

    /// Creates every selected collection before any group is written. With
    /// `force_recreate` all of them are dropped first.
    async fn provision_groups(
        &mut self,
        groups: &[GroupSpec],
        force_recreate: bool,
    ) -> Result<(), MigrationError> {
        for group in groups {
            let Some(plan) = self.plans.get(&group.name) else {
                return Err(MigrationError::UnknownGroup(group.name.clone()));
            };
            let provisioned = self
                .provisioner
                .ensure_collection(&plan.schema, force_recreate)
                .await;
            if let Err(err) = provisioned {
                return Err(self.fail_group(&group.name, err.into()));
            }
        }
        Ok(())
    }

    async fn process_groups(&mut self, groups: &[GroupSpec]) -> Result<(), MigrationError> {
        for group in groups {
            let processed = self.process_group(group).await;
            if let Err(err) = processed {
                return Err(self.fail_group(&group.name, err));
            }
        }
        Ok(())
    }

    /// Records `err` on the group and hands it back. The run stays IN_PROGRESS.
    fn fail_group(&mut self, group: &str, err: MigrationError) -> MigrationError {
        error!(group = %group, error = %err, "Group failed; run left resumable");
        if let Err(record_err) = self.checkpoint.record_error(group, &err.to_string()) {
            warn!(group = %group, error = %record_err, "Could not record group error");
        }
        err
    }

    async fn process_group(&mut self, group: &GroupSpec) -> Result<(), MigrationError> {
        let plan = self
            .plans
            .get(&group.name)
            .cloned()
            .ok_or_else(|| MigrationError::UnknownGroup(group.name.clone()))?;
        let name = group.name.as_str();

        self.checkpoint.start_group(name)?;
        info!(group = %name, collection = plan.collection(), "Processing group");

        self.provisioner.ensure_collection(&plan.schema, false).await?;

        let mut rows = RowsByTable::new();
        for table in group.all_tables() {
            let source = &self.source;
            let table_rows = self
                .writer
                .retry_policy()
                .run(|| source.get_rows(&table), classify_source_error)
                .await
                .map_err(RetryError::into_inner)?;
            rows.insert(table, table_rows);
        }

        let items = plan.transform.apply(&rows)?;
        let total = items.len() as u64;
        if self.group_total(name) != Some(total) {
            self.checkpoint.set_group_total(name, total)?;
        }

        let marker = self.write_items(name, plan.collection(), items).await?;
        self.checkpoint.complete_group(name, marker.as_deref())?;

        info!(group = %name, records = total, "Group completed");
        Ok(())
    }

    /// Writes a group's items chunk by chunk, checkpointing after each
    /// acknowledged chunk. Returns the key of the last item written.
    async fn write_items(
        &mut self,
        group: &str,
        collection: &str,
        items: Vec<Item>,
    ) -> Result<Option<String>, MigrationError> {
        let total = items.len() as u64;
        let mut migrated = 0u64;
        let mut marker = None;
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let chunk: Vec<Item> = items.by_ref().take(self.writer.chunk_size()).collect();
            let last_key = chunk.last().map(|item| item.key().to_string());

            let outcome = self.writer.write_chunk(collection, chunk).await?;
            if !outcome.fully_succeeded() {
                return Err(MigrationError::UnresolvedItems {
                    group: group.to_string(),
                    count: outcome.unresolved.len(),
                });
            }

            migrated += outcome.written as u64;
            marker = last_key;
            if migrated < total {
                self.checkpoint
                    .update_group_progress(group, migrated, marker.as_deref())?;
            }
        }

        Ok(marker)
    }

    fn group_total(&self, name: &str) -> Option<u64> {
        self.checkpoint
            .run()
            .and_then(|run| run.groups.get(name))
            .map(|g| g.total_records)
    }

    fn finish(&mut self) -> Result<RunSummary, MigrationError> {
        self.checkpoint.complete_run()?;

        let metrics = self.writer.metrics().snapshot();
        let summary = self
            .checkpoint
            .run()
            .map(|run| RunSummary {
                run_id: run.id.clone(),
                status: run.status,
                groups: run.group_order.clone(),
                migrated_records: run.migrated_records,
                metrics,
            })
            .ok_or(CheckpointError::NoActiveRun)?;

        info!(
            run_id = %summary.run_id,
            records = summary.migrated_records,
            batches = metrics.batches_written,
            retries = metrics.retry_count,
            "Migration run finished"
        );
        Ok(summary)
    }
}
