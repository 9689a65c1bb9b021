use crate::error::MigrationError;
use chrono::{DateTime, Utc};
use connectors::{source::SourceProvider, target::TargetStore};
use engine_core::state::MigrationRun;
use model::schema::collection::CollectionStatus;
use serde::Serialize;
use tracing::{info, warn};

/// Number of items scanned per collection for structural checks.
pub const SAMPLE_SIZE: usize = 25;

/// A group to check: where its items live and which tables produced them.
#[derive(Debug, Clone)]
pub struct ValidationTarget {
    pub group: String,
    pub collection: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupValidation {
    pub group: String,
    pub collection: String,
    pub expected: u64,
    pub actual: u64,
    pub sampled: usize,
    pub issues: Vec<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub run_id: Option<String>,
    pub valid: bool,
    pub groups: Vec<GroupValidation>,
}

impl ValidationReport {
    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupValidation> {
        self.groups.iter().filter(|g| !g.valid)
    }
}

/// Compares item counts against the checkpoint (or source row counts when the
/// run does not know the group) and spot-checks a sample of stored items.
pub async fn validate(
    source: &dyn SourceProvider,
    target: &dyn TargetStore,
    run: Option<&MigrationRun>,
    targets: &[ValidationTarget],
) -> Result<ValidationReport, MigrationError> {
    let mut groups = Vec::with_capacity(targets.len());

    for t in targets {
        let expected = match run.and_then(|run| run.groups.get(&t.group)) {
            Some(progress) => progress.total_records,
            None => {
                let mut total = 0;
                for table in &t.tables {
                    total += source.count_rows(table).await?;
                }
                total
            }
        };

        let mut issues = Vec::new();
        let (actual, sampled) = match target.describe_status(&t.collection).await? {
            CollectionStatus::Missing => {
                issues.push(format!("collection '{}' does not exist", t.collection));
                (0, 0)
            }
            _ => {
                let actual = target.item_count(&t.collection).await?;
                let sample = target.scan(&t.collection, Some(SAMPLE_SIZE)).await?;
                for item in &sample {
                    if item.pk.is_empty() || item.sk.is_empty() {
                        issues.push(format!("item {} has an empty key", item.key()));
                    }
                    if item.entity_type.is_empty() {
                        issues.push(format!("item {} has no entity type", item.key()));
                    }
                }
                (actual, sample.len())
            }
        };

        if actual != expected {
            issues.push(format!("expected {expected} items, found {actual}"));
        }

        let valid = issues.is_empty();
        if valid {
            info!(group = %t.group, items = actual, "Group validated");
        } else {
            warn!(group = %t.group, issues = issues.len(), "Group failed validation");
        }

        groups.push(GroupValidation {
            group: t.group.clone(),
            collection: t.collection.clone(),
            expected,
            actual,
            sampled,
            issues,
            valid,
        });
    }

    Ok(ValidationReport {
        generated_at: Utc::now(),
        source: source.identity().to_string(),
        run_id: run.map(|run| run.id.clone()),
        valid: groups.iter().all(|g| g.valid),
        groups,
    })
}
