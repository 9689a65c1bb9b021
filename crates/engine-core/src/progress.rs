use crate::state::models::{GroupProgress, MigrationRun, MigrationStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Coarse stage of a migration as shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStage {
    Idle,
    Running,
    Paused,
    Done,
    Failed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "Idle",
            ProgressStage::Running => "Running",
            ProgressStage::Paused => "Paused",
            ProgressStage::Done => "Done",
            ProgressStage::Failed => "Failed",
        }
    }
}

impl From<MigrationStatus> for ProgressStage {
    fn from(status: MigrationStatus) -> Self {
        match status {
            MigrationStatus::NotStarted => ProgressStage::Idle,
            MigrationStatus::InProgress => ProgressStage::Running,
            MigrationStatus::Paused => ProgressStage::Paused,
            MigrationStatus::Completed => ProgressStage::Done,
            MigrationStatus::Failed => ProgressStage::Failed,
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupStatus {
    pub name: String,
    pub status: MigrationStatus,
    pub progress_pct: f64,
    pub total_records: u64,
    pub migrated_records: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub duration_secs: Option<i64>,
}

impl From<&GroupProgress> for GroupStatus {
    fn from(group: &GroupProgress) -> Self {
        GroupStatus {
            name: group.name.clone(),
            status: group.status,
            progress_pct: group.progress_pct(),
            total_records: group.total_records,
            migrated_records: group.migrated_records,
            error_count: group.error_count,
            last_error: group.last_error.clone(),
            duration_secs: group.duration_secs(),
        }
    }
}

/// Operator-facing summary of the persisted run.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub run_id: Option<String>,
    pub stage: ProgressStage,
    pub overall_status: MigrationStatus,
    pub overall_progress: f64,
    pub total_groups: usize,
    pub completed_groups: usize,
    pub total_records: u64,
    pub migrated_records: u64,
    pub error_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_checkpoint: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub groups: Vec<GroupStatus>,
}

impl StatusReport {
    /// Report for a missing run.
    pub fn not_started() -> Self {
        StatusReport {
            run_id: None,
            stage: ProgressStage::Idle,
            overall_status: MigrationStatus::NotStarted,
            overall_progress: 0.0,
            total_groups: 0,
            completed_groups: 0,
            total_records: 0,
            migrated_records: 0,
            error_count: 0,
            started_at: None,
            last_checkpoint: None,
            duration_secs: None,
            groups: Vec::new(),
        }
    }

    pub fn from_run(run: Option<&MigrationRun>) -> Self {
        let Some(run) = run else {
            return Self::not_started();
        };

        StatusReport {
            run_id: Some(run.id.clone()),
            stage: run.status.into(),
            overall_status: run.status,
            overall_progress: run.progress_pct(),
            total_groups: run.groups.len(),
            completed_groups: run.completed_groups(),
            total_records: run.total_records,
            migrated_records: run.migrated_records,
            error_count: run.error_count,
            started_at: run.started_at,
            last_checkpoint: run.last_checkpoint,
            duration_secs: run.duration_secs(),
            groups: run.ordered_groups().map(GroupStatus::from).collect(),
        }
    }
}
