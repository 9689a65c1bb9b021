use crate::{
    error::CheckpointError,
    state::models::{GroupProgress, MigrationRun, MigrationStatus, ResumeEntry, ResumeInfo},
};
use chrono::Utc;
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File-backed checkpoint for a single migration run.
///
/// Every mutation rewrites the whole snapshot before returning: the document is
/// serialized into a temporary file beside the checkpoint, synced, and renamed
/// over it, so a crash leaves either the previous or the new snapshot.
///
/// One process is expected to own a checkpoint file at a time. Concurrent
/// writers are not detected and the last rename wins.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    run: Option<MigrationRun>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore {
            path: path.into(),
            run: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory view of the run, if one has been initialized or loaded.
    pub fn run(&self) -> Option<&MigrationRun> {
        self.run.as_ref()
    }

    /// Creates a fresh run with every group NOT_STARTED, replacing any
    /// previous snapshot.
    pub fn initialize(
        &mut self,
        run_id: &str,
        source_identity: &str,
        groups: &[(String, u64)],
    ) -> Result<MigrationRun, CheckpointError> {
        let mut run = MigrationRun::new(run_id, source_identity);
        for (name, total) in groups {
            if run.groups.contains_key(name) {
                continue;
            }
            run.group_order.push(name.clone());
            run.groups.insert(name.clone(), GroupProgress::new(name.clone(), *total));
        }
        run.refresh_totals();
        run.status = MigrationStatus::InProgress;
        run.started_at = Some(Utc::now());

        self.run = Some(run);
        self.persist()?;

        info!(
            run_id,
            groups = groups.len(),
            path = %self.path.display(),
            "Initialized migration run"
        );
        self.current().cloned()
    }

    /// Reads the persisted snapshot. A missing file yields `None`; a file that
    /// cannot be parsed or fails structural checks is a corruption error and
    /// leaves no run loaded.
    pub fn load(&mut self) -> Result<Option<MigrationRun>, CheckpointError> {
        self.run = None;

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let run: MigrationRun =
            serde_json::from_str(&contents).map_err(|err| self.corrupted(err.to_string()))?;
        run.validate().map_err(|reason| self.corrupted(reason))?;

        debug!(run_id = %run.id, status = %run.status, "Loaded checkpoint");
        self.run = Some(run.clone());
        Ok(Some(run))
    }

    pub fn start_group(&mut self, name: &str) -> Result<(), CheckpointError> {
        let group = self.active_group(name)?;
        transition(&group.name, group.status, MigrationStatus::InProgress)?;

        group.status = MigrationStatus::InProgress;
        group.migrated_records = 0;
        group.last_marker = None;
        group.started_at = Some(Utc::now());
        group.ended_at = None;

        self.refresh_and_persist()
    }

    /// Records how many items of the group the target has acknowledged.
    pub fn update_group_progress(
        &mut self,
        name: &str,
        migrated: u64,
        marker: Option<&str>,
    ) -> Result<(), CheckpointError> {
        let group = self.active_group(name)?;
        if group.status != MigrationStatus::InProgress {
            return Err(CheckpointError::InvalidTransition {
                entity: group.name.clone(),
                from: group.status,
                to: MigrationStatus::InProgress,
            });
        }
        if migrated > group.total_records {
            return Err(CheckpointError::ProgressOverflow {
                group: group.name.clone(),
                migrated,
                total: group.total_records,
            });
        }

        group.migrated_records = migrated;
        if let Some(marker) = marker {
            group.last_marker = Some(marker.to_string());
        }

        self.refresh_and_persist()
    }

    /// Re-bases the expected total of a group that has not finished yet.
    pub fn set_group_total(&mut self, name: &str, total: u64) -> Result<(), CheckpointError> {
        let group = self.active_group(name)?;
        if group.status.is_terminal() {
            return Err(CheckpointError::InvalidTransition {
                entity: group.name.clone(),
                from: group.status,
                to: group.status,
            });
        }
        if group.migrated_records > total {
            return Err(CheckpointError::ProgressOverflow {
                group: group.name.clone(),
                migrated: group.migrated_records,
                total,
            });
        }

        group.total_records = total;
        self.refresh_and_persist()
    }

    pub fn complete_group(
        &mut self,
        name: &str,
        marker: Option<&str>,
    ) -> Result<(), CheckpointError> {
        let group = self.active_group(name)?;
        transition(&group.name, group.status, MigrationStatus::Completed)?;

        group.status = MigrationStatus::Completed;
        group.migrated_records = group.total_records;
        group.ended_at = Some(Utc::now());
        if let Some(marker) = marker {
            group.last_marker = Some(marker.to_string());
        }

        self.refresh_and_persist()
    }

    /// Stores an error against a group without changing its status.
    pub fn record_error(&mut self, name: &str, message: &str) -> Result<(), CheckpointError> {
        let run = self.current_mut()?;
        let group = run
            .groups
            .get_mut(name)
            .ok_or_else(|| CheckpointError::UnknownGroup(name.to_string()))?;

        group.error_count += 1;
        group.last_error = Some(message.to_string());
        run.error_count += 1;

        warn!(group = %name, error = %message, "Recorded group error");
        self.persist()
    }

    /// Marks the run COMPLETED. Every group has to be completed first.
    pub fn complete_run(&mut self) -> Result<(), CheckpointError> {
        let run = self.current_mut()?;
        transition(&run.id, run.status, MigrationStatus::Completed)?;

        let unfinished: Vec<String> = run
            .ordered_groups()
            .filter(|g| !g.is_complete())
            .map(|g| g.name.clone())
            .collect();
        if !unfinished.is_empty() {
            return Err(CheckpointError::GroupsIncomplete(unfinished));
        }

        run.status = MigrationStatus::Completed;
        run.ended_at = Some(Utc::now());
        run.refresh_totals();

        info!(run_id = %run.id, records = run.migrated_records, "Migration run completed");
        self.persist()
    }

    pub fn pause(&mut self) -> Result<(), CheckpointError> {
        self.set_run_status(MigrationStatus::Paused)
    }

    pub fn resume_run(&mut self) -> Result<(), CheckpointError> {
        self.set_run_status(MigrationStatus::InProgress)
    }

    /// True iff a persisted run exists and is IN_PROGRESS.
    pub fn has_incomplete_run(&mut self) -> Result<bool, CheckpointError> {
        Ok(self
            .load()?
            .is_some_and(|run| run.status == MigrationStatus::InProgress))
    }

    /// Groups still to be processed, or `None` when there is nothing to resume.
    pub fn resume_info(&mut self) -> Result<Option<ResumeInfo>, CheckpointError> {
        let Some(run) = self.load()? else {
            return Ok(None);
        };
        if run.is_complete() {
            return Ok(None);
        }

        let incomplete = run
            .ordered_groups()
            .filter(|g| !g.is_complete())
            .map(|g| ResumeEntry {
                group: g.name.clone(),
                status: g.status,
                migrated_records: g.migrated_records,
                total_records: g.total_records,
                last_marker: g.last_marker.clone(),
            })
            .collect();

        Ok(Some(ResumeInfo {
            run_id: run.id.clone(),
            status: run.status,
            last_checkpoint: run.last_checkpoint,
            incomplete,
        }))
    }

    /// Deletes the persisted snapshot and forgets the in-memory run.
    /// Returns whether a file was removed.
    pub fn reset(&mut self) -> Result<bool, CheckpointError> {
        self.run = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Checkpoint removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn set_run_status(&mut self, next: MigrationStatus) -> Result<(), CheckpointError> {
        let run = self.current_mut()?;
        transition(&run.id, run.status, next)?;
        run.status = next;
        info!(run_id = %run.id, status = %next, "Run status changed");
        self.persist()
    }

    fn current(&self) -> Result<&MigrationRun, CheckpointError> {
        self.run.as_ref().ok_or(CheckpointError::NoActiveRun)
    }

    fn current_mut(&mut self) -> Result<&mut MigrationRun, CheckpointError> {
        self.run.as_mut().ok_or(CheckpointError::NoActiveRun)
    }

    /// Group of a run that is accepting progress updates.
    fn active_group(&mut self, name: &str) -> Result<&mut GroupProgress, CheckpointError> {
        let run = self.current_mut()?;
        if run.status != MigrationStatus::InProgress {
            return Err(CheckpointError::InvalidTransition {
                entity: run.id.clone(),
                from: run.status,
                to: MigrationStatus::InProgress,
            });
        }
        run.groups
            .get_mut(name)
            .ok_or_else(|| CheckpointError::UnknownGroup(name.to_string()))
    }

    fn refresh_and_persist(&mut self) -> Result<(), CheckpointError> {
        self.current_mut()?.refresh_totals();
        self.persist()
    }

    fn persist(&mut self) -> Result<(), CheckpointError> {
        let run = self.run.as_mut().ok_or(CheckpointError::NoActiveRun)?;
        run.last_checkpoint = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(run)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }

    fn corrupted(&self, reason: String) -> CheckpointError {
        CheckpointError::Corrupted {
            path: self.path.display().to_string(),
            reason,
        }
    }
}

fn transition(
    entity: &str,
    from: MigrationStatus,
    to: MigrationStatus,
) -> Result<(), CheckpointError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CheckpointError::InvalidTransition {
            entity: entity.to_string(),
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn groups(sizes: &[(&str, u64)]) -> Vec<(String, u64)> {
        sizes.iter().map(|(n, s)| (n.to_string(), *s)).collect()
    }

    fn store_in(dir: &Path) -> CheckpointStore {
        CheckpointStore::new(dir.join("chinook_migration_state.json"))
    }

    #[test]
    fn initialize_persists_full_snapshot() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let run = store
            .initialize("run-1", "chinook.db", &groups(&[("a", 20), ("b", 50)]))
            .unwrap();

        assert_eq!(run.status, MigrationStatus::InProgress);
        assert_eq!(run.total_records, 70);
        assert_eq!(run.group_order, vec!["a", "b"]);

        let mut reopened = store_in(dir.path());
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.id, "run-1");
        assert_eq!(loaded.groups["b"].status, MigrationStatus::NotStarted);
        assert!(reopened.has_incomplete_run().unwrap());
    }

    #[test]
    fn progress_survives_reload() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 20), ("b", 50)])).unwrap();

        store.start_group("a").unwrap();
        store.complete_group("a", Some("A#20|META")).unwrap();
        store.start_group("b").unwrap();
        store.update_group_progress("b", 15, Some("B#15|META")).unwrap();

        let mut reopened = store_in(dir.path());
        let run = reopened.load().unwrap().unwrap();
        assert_eq!(run.migrated_records, 35);
        assert_eq!(run.groups["a"].migrated_records, 20);
        assert_eq!(run.groups["b"].last_marker.as_deref(), Some("B#15|META"));

        let info = reopened.resume_info().unwrap().unwrap();
        assert_eq!(info.incomplete.len(), 1);
        assert_eq!(info.incomplete[0].group, "b");
        assert_eq!(info.incomplete[0].migrated_records, 15);
    }

    #[test]
    fn progress_cannot_exceed_total() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 5)])).unwrap();
        store.start_group("a").unwrap();

        let err = store.update_group_progress("a", 6, None).unwrap_err();
        assert!(matches!(err, CheckpointError::ProgressOverflow { .. }));
        assert!(matches!(
            store.set_group_total("a", 0).and(store.update_group_progress("a", 1, None)),
            Err(CheckpointError::ProgressOverflow { .. })
        ));
    }

    #[test]
    fn restarting_a_group_resets_its_count() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 50)])).unwrap();
        store.start_group("a").unwrap();
        store.update_group_progress("a", 15, None).unwrap();

        store.start_group("a").unwrap();
        let run = store.run().unwrap();
        assert_eq!(run.groups["a"].migrated_records, 0);
        assert_eq!(run.migrated_records, 0);
    }

    #[test]
    fn run_completes_only_after_all_groups() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 1), ("b", 2)])).unwrap();
        store.start_group("a").unwrap();
        store.complete_group("a", None).unwrap();

        let err = store.complete_run().unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::GroupsIncomplete(ref g) if g == &vec!["b".to_string()]
        ));

        store.start_group("b").unwrap();
        store.complete_group("b", None).unwrap();
        store.complete_run().unwrap();

        assert!(!store.has_incomplete_run().unwrap());
        assert!(store.resume_info().unwrap().is_none());
        assert!(matches!(
            store.start_group("a"),
            Err(CheckpointError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn pause_blocks_progress_until_resumed() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 3)])).unwrap();
        store.pause().unwrap();

        assert!(!store.has_incomplete_run().unwrap());
        assert!(store.start_group("a").is_err());

        store.resume_run().unwrap();
        store.start_group("a").unwrap();
        assert_eq!(store.run().unwrap().status, MigrationStatus::InProgress);
    }

    #[test]
    fn errors_are_counted_per_group_and_run() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 3)])).unwrap();
        store.record_error("a", "throttled").unwrap();
        store.record_error("a", "denied").unwrap();

        let run = store_in(dir.path()).load().unwrap().unwrap();
        assert_eq!(run.error_count, 2);
        assert_eq!(run.groups["a"].error_count, 2);
        assert_eq!(run.groups["a"].last_error.as_deref(), Some("denied"));
        assert!(matches!(
            store.record_error("zzz", "x"),
            Err(CheckpointError::UnknownGroup(_))
        ));
    }

    #[test]
    fn corrupted_file_is_reported_and_nothing_is_loaded() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 3)])).unwrap();

        fs::write(store.path(), "{ \"id\": \"run-1\", \"status\": ").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupted { .. }));
        assert!(store.run().is_none());
        assert!(store.has_incomplete_run().is_err());
    }

    #[test]
    fn structurally_invalid_snapshot_is_corrupt() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 3)])).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        json["groups"]["a"]["migrated_records"] = 9.into();
        fs::write(store.path(), json.to_string()).unwrap();

        assert!(matches!(
            store.load(),
            Err(CheckpointError::Corrupted { .. })
        ));
    }

    #[test]
    fn reset_removes_file() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize("run-1", "src", &groups(&[("a", 3)])).unwrap();

        assert!(store.reset().unwrap());
        assert!(!store.path().exists());
        assert!(store.run().is_none());
        assert!(store.load().unwrap().is_none());
        assert!(!store.reset().unwrap());
    }
}
