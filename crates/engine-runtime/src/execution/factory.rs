use crate::{
    error::MigrationError,
    execution::coordinator::{GroupPlan, MigrationCoordinator},
    validation::ValidationTarget,
};
use connectors::{
    kv::sled::SledTargetStore, memory::target::MemoryTargetStore, source::SourceProvider,
    sql::sqlite::source::SqliteSource, target::TargetStore,
};
use engine_config::settings::{MigrationConfig, TargetConfig};
use engine_core::{metrics::Metrics, state::CheckpointStore};
use engine_processing::{
    consumer::BatchWriter, provisioning::Provisioner, transform::mapping::TemplateTransform,
};
use std::sync::Arc;
use tracing::debug;

pub fn create_source(config: &MigrationConfig) -> Result<Arc<dyn SourceProvider>, MigrationError> {
    let source = SqliteSource::open(&config.source_db, config.group_layouts())?;
    debug!(source = %config.source_db.display(), "Opened SQLite source");
    Ok(Arc::new(source))
}

pub fn create_target(config: &MigrationConfig) -> Result<Arc<dyn TargetStore>, MigrationError> {
    match &config.target {
        TargetConfig::Sled { path } => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            debug!(path = %path.display(), "Opening sled target");
            Ok(Arc::new(SledTargetStore::open(path)?))
        }
        TargetConfig::Memory => Ok(Arc::new(MemoryTargetStore::new())),
    }
}

/// One plan per configured group, keyed by group name.
pub fn group_plans(config: &MigrationConfig) -> Result<Vec<(String, GroupPlan)>, MigrationError> {
    config
        .groups
        .iter()
        .map(|group| {
            let transform = TemplateTransform::new(group)?;
            let plan = GroupPlan::new(group.schema(&config.table_prefix), Arc::new(transform));
            Ok((group.name.clone(), plan))
        })
        .collect()
}

pub fn create_coordinator(
    config: &MigrationConfig,
    source: Arc<dyn SourceProvider>,
    target: Arc<dyn TargetStore>,
    metrics: Metrics,
) -> Result<MigrationCoordinator, MigrationError> {
    let writer = BatchWriter::new(target.clone(), config.batch_size, config.retry.policy())
        .with_metrics(metrics);
    let provisioner = Provisioner::new(
        target,
        config.provisioning.poll_interval(),
        config.provisioning.timeout(),
    );
    let checkpoint = CheckpointStore::new(config.checkpoint_path());

    let coordinator = group_plans(config)?
        .into_iter()
        .fold(
            MigrationCoordinator::new(source, checkpoint, writer, provisioner),
            |coordinator, (name, plan)| coordinator.with_group(name, plan),
        );
    Ok(coordinator)
}

pub fn validation_targets(config: &MigrationConfig) -> Vec<ValidationTarget> {
    config
        .groups
        .iter()
        .map(|group| ValidationTarget {
            group: group.name.clone(),
            collection: config.collection_name(group),
            tables: group.entity_tables(),
        })
        .collect()
}
