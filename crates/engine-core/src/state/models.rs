use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Current on-disk checkpoint format.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    Paused,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::NotStarted => "not_started",
            MigrationStatus::InProgress => "in_progress",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::Paused => "paused",
        }
    }

    /// Whether moving from `self` to `next` is a legal step.
    ///
    /// `InProgress -> InProgress` is allowed so that an interrupted group can be
    /// restarted. Completed and Failed are terminal.
    pub fn can_transition_to(&self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;
        matches!(
            (self, next),
            (NotStarted, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Paused)
                | (Paused, InProgress)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Failed)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one group (one target collection).
///
/// `migrated_records == total_records` holds exactly when the group is
/// COMPLETED, with one exception: a group with no records reads 0/0 from
/// initialization until it is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub name: String,
    pub status: MigrationStatus,
    pub total_records: u64,
    pub migrated_records: u64,
    /// Key of the last acknowledged item. Informational: resume always
    /// replays a group from its first row.
    pub last_marker: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl GroupProgress {
    pub fn new(name: impl Into<String>, total_records: u64) -> Self {
        GroupProgress {
            name: name.into(),
            status: MigrationStatus::NotStarted,
            total_records,
            migrated_records: 0,
            last_marker: None,
            started_at: None,
            ended_at: None,
            error_count: 0,
            last_error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == MigrationStatus::Completed
    }

    pub fn progress_pct(&self) -> f64 {
        percentage(self.migrated_records, self.total_records)
    }

    pub fn duration_secs(&self) -> Option<i64> {
        Some((self.ended_at? - self.started_at?).num_seconds())
    }
}

/// Full snapshot of one migration run, persisted as a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub version: u32,
    pub id: String,
    pub status: MigrationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub source_identity: String,
    pub total_records: u64,
    pub migrated_records: u64,
    pub error_count: u64,
    pub last_checkpoint: Option<DateTime<Utc>>,
    /// Processing order of the groups; every key of `groups` appears once.
    pub group_order: Vec<String>,
    pub groups: BTreeMap<String, GroupProgress>,
}

impl MigrationRun {
    pub fn new(id: impl Into<String>, source_identity: impl Into<String>) -> Self {
        MigrationRun {
            version: CHECKPOINT_VERSION,
            id: id.into(),
            status: MigrationStatus::NotStarted,
            started_at: None,
            ended_at: None,
            source_identity: source_identity.into(),
            total_records: 0,
            migrated_records: 0,
            error_count: 0,
            last_checkpoint: None,
            group_order: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Groups in processing order.
    pub fn ordered_groups(&self) -> impl Iterator<Item = &GroupProgress> {
        self.group_order.iter().filter_map(|name| self.groups.get(name))
    }

    pub fn completed_groups(&self) -> usize {
        self.groups.values().filter(|g| g.is_complete()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.status == MigrationStatus::Completed
    }

    pub fn progress_pct(&self) -> f64 {
        percentage(self.migrated_records, self.total_records)
    }

    pub fn duration_secs(&self) -> Option<i64> {
        Some((self.ended_at? - self.started_at?).num_seconds())
    }

    /// Recomputes run-level counters from the groups.
    pub(crate) fn refresh_totals(&mut self) {
        self.total_records = self.groups.values().map(|g| g.total_records).sum();
        self.migrated_records = self.groups.values().map(|g| g.migrated_records).sum();
    }

    /// Checks the structural invariants a trustworthy snapshot satisfies.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != CHECKPOINT_VERSION {
            return Err(format!("unsupported checkpoint version {}", self.version));
        }

        if self.group_order.len() != self.groups.len() {
            return Err(format!(
                "group order lists {} groups but {} are recorded",
                self.group_order.len(),
                self.groups.len()
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for name in &self.group_order {
            if !seen.insert(name.as_str()) {
                return Err(format!("group '{name}' appears twice in the group order"));
            }
            if !self.groups.contains_key(name) {
                return Err(format!("group '{name}' is ordered but has no progress entry"));
            }
        }

        for (key, group) in &self.groups {
            if &group.name != key {
                return Err(format!("group entry '{key}' is named '{}'", group.name));
            }
            if group.migrated_records > group.total_records {
                return Err(format!(
                    "group '{key}' has {} migrated records out of {}",
                    group.migrated_records, group.total_records
                ));
            }
            if group.is_complete() && group.migrated_records != group.total_records {
                return Err(format!("group '{key}' is completed with a partial count"));
            }
        }

        let total: u64 = self.groups.values().map(|g| g.total_records).sum();
        let migrated: u64 = self.groups.values().map(|g| g.migrated_records).sum();
        if total != self.total_records || migrated != self.migrated_records {
            return Err(format!(
                "run counters {}/{} disagree with group sums {migrated}/{total}",
                self.migrated_records, self.total_records
            ));
        }

        if self.is_complete() && self.completed_groups() != self.groups.len() {
            return Err("run is completed but some groups are not".to_string());
        }

        Ok(())
    }
}

/// A group that still has to be (re)processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeEntry {
    pub group: String,
    pub status: MigrationStatus,
    pub migrated_records: u64,
    pub total_records: u64,
    pub last_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeInfo {
    pub run_id: String,
    pub status: MigrationStatus,
    pub last_checkpoint: Option<DateTime<Utc>>,
    pub incomplete: Vec<ResumeEntry>,
}

fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}
