use crate::{
    error::MigrationError,
    execution::{GroupPlan, MigrationCoordinator, ResumeOutcome},
};
use connectors::{
    error::TargetError,
    memory::{
        source::MemorySource,
        target::{BatchResponse, MemoryTargetStore},
    },
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
use model::{
    records::{
        item::Item,
        row::{Row, RowsByTable},
    },
    schema::collection::CollectionSchema,
};
use std::{path::Path, sync::Arc, time::Duration};
use tempfile::tempdir;
use tracing_test::traced_test;

fn rows(n: usize) -> Vec<Row> {
    (1..=n).map(|i| Row::default().with("Id", i as i64)).collect()
}

fn group(name: &str, table: &str, rank: usize) -> GroupSpec {
    GroupSpec {
        name: name.into(),
        tables: vec![table.into()],
        lookups: vec![],
        rank,
    }
}

/// `copies` items per row of `table`, keyed by the row id.
fn per_row(table: &str, copies: usize) -> Arc<dyn Transform> {
    let table = table.to_string();
    Arc::new(move |rows: &RowsByTable| -> Result<Vec<Item>, TransformError> {
        let source = rows
            .get(&table)
            .ok_or_else(|| TransformError::MissingTable(table.clone()))?;
        Ok(source
            .iter()
            .flat_map(|row| {
                let id = row.get_value("Id");
                (0..copies).map(move |copy| (id.clone(), copy))
            })
            .map(|(id, copy)| {
                Item::new(
                    format!("{}#{id}", table.to_uppercase()),
                    format!("COPY#{copy}"),
                    &table,
                )
            })
            .collect())
    })
}

struct Harness {
    store: Arc<MemoryTargetStore>,
    coordinator: MigrationCoordinator,
}

fn harness(dir: &Path, source: MemorySource, batch_size: usize, retries: usize) -> Harness {
    let store = Arc::new(MemoryTargetStore::new());
    let groups: Vec<(String, String)> = vec![
        ("artists".into(), "Artist".into()),
        ("albums".into(), "Album".into()),
        ("tracks".into(), "Track".into()),
    ];

    let writer = BatchWriter::new(store.clone(), batch_size, RetryPolicy::immediate(retries));
    let provisioner = Provisioner::new(
        store.clone(),
        Duration::from_millis(1),
        Duration::from_secs(1),
    );
    let checkpoint = CheckpointStore::new(dir.join("state.json"));

    let coordinator = groups.into_iter().fold(
        MigrationCoordinator::new(Arc::new(source), checkpoint, writer, provisioner),
        |c, (name, table)| {
            let plan = GroupPlan::new(
                CollectionSchema::keyed(format!("coll_{name}")),
                per_row(&table, 1),
            );
            c.with_group(name, plan)
        },
    );

    Harness { store, coordinator }
}

fn music_source() -> MemorySource {
    MemorySource::new("music.db")
        .with_table("Artist", rows(5))
        .with_table("Album", rows(10))
        .with_table("Track", rows(3))
        .with_group(group("tracks", "Track", 1))
        .with_group(group("albums", "Album", 0))
        .with_group(group("artists", "Artist", 0))
}

#[traced_test]
#[tokio::test]
async fn groups_run_by_rank_then_size() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);

    let summary = h.coordinator.start(None, false).await.unwrap();

    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.groups, vec!["artists", "albums", "tracks"]);
    assert_eq!(summary.migrated_records, 18);
    assert_eq!(h.store.items("coll_albums").await.len(), 10);
    assert!(logs_contain("Migration run finished"));
}

#[tokio::test]
async fn selection_limits_the_run() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);

    let selection = vec!["tracks".to_string()];
    let summary = h.coordinator.start(Some(&selection), false).await.unwrap();

    assert_eq!(summary.groups, vec!["tracks"]);
    assert_eq!(summary.migrated_records, 3);
    assert!(h.store.schema("coll_artists").await.is_none());
}

#[tokio::test]
async fn unknown_group_is_rejected_before_any_work() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);

    let selection = vec!["invoices".to_string()];
    let err = h.coordinator.start(Some(&selection), false).await.unwrap_err();

    assert!(matches!(err, MigrationError::UnknownGroup(name) if name == "invoices"));
    assert!(!dir.path().join("state.json").exists());
}

#[traced_test]
#[tokio::test]
async fn fatal_write_leaves_the_run_resumable() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 4, 0);
    // artists: 4 + 1 accepted, then albums fails on its first chunk
    h.store
        .script([
            BatchResponse::Accept,
            BatchResponse::Accept,
            BatchResponse::Fail(TargetError::AccessDenied("denied".into())),
        ])
        .await;

    let err = h.coordinator.start(None, false).await.unwrap_err();
    assert!(matches!(err, MigrationError::Write(_)));

    let run = h.coordinator.checkpoint_mut().load().unwrap().unwrap();
    assert_eq!(run.status, MigrationStatus::InProgress);
    assert_eq!(run.groups["artists"].status, MigrationStatus::Completed);
    let albums = &run.groups["albums"];
    assert_eq!(albums.status, MigrationStatus::InProgress);
    assert_eq!(albums.error_count, 1);
    assert!(albums.last_error.as_deref().unwrap().contains("denied"));
    assert_eq!(run.error_count, 1);
    assert!(logs_contain("Group failed; run left resumable"));

    let again = h.coordinator.start(None, false).await.unwrap_err();
    assert!(matches!(again, MigrationError::IncompleteRun { .. }));

    let ResumeOutcome::Resumed(summary) = h.coordinator.resume().await.unwrap() else {
        panic!("expected the run to resume");
    };
    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.migrated_records, 18);
}

#[tokio::test]
async fn progress_is_checkpointed_per_acknowledged_chunk() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new("music.db")
        .with_table("Artist", rows(25))
        .with_group(group("artists", "Artist", 0));
    let mut h = harness(dir.path(), source, 10, 0);
    h.store
        .script([
            BatchResponse::Accept,
            BatchResponse::Accept,
            BatchResponse::Fail(TargetError::Validation("bad item".into())),
        ])
        .await;

    h.coordinator.start(None, false).await.unwrap_err();

    let run = h.coordinator.checkpoint_mut().load().unwrap().unwrap();
    let artists = &run.groups["artists"];
    assert_eq!(artists.migrated_records, 20);
    assert_eq!(artists.total_records, 25);
    assert_eq!(artists.last_marker.as_deref(), Some("ARTIST#20|COPY#0"));
    assert_eq!(h.store.put_calls().await, vec![10, 10, 5]);
}

#[tokio::test]
async fn exhausted_retries_abort_the_group() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 1);
    h.store
        .script([BatchResponse::RejectAll, BatchResponse::RejectFirst(2)])
        .await;

    let err = h.coordinator.start(None, false).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::UnresolvedItems { ref group, count: 2 } if group == "artists"
    ));
}

#[tokio::test]
async fn totals_follow_the_transform_output() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryTargetStore::new());
    let source = MemorySource::new("music.db")
        .with_table("Album", rows(4))
        .with_group(group("albums", "Album", 0));

    let mut coordinator = MigrationCoordinator::new(
        Arc::new(source),
        CheckpointStore::new(dir.path().join("state.json")),
        BatchWriter::new(store.clone(), 25, RetryPolicy::immediate(0)),
        Provisioner::new(store.clone(), Duration::from_millis(1), Duration::from_secs(1)),
    )
    .with_group(
        "albums",
        GroupPlan::new(CollectionSchema::keyed("coll_albums"), per_row("Album", 3)),
    );

    let summary = coordinator.start(None, false).await.unwrap();

    assert_eq!(summary.migrated_records, 12);
    assert_eq!(store.item_count("coll_albums").await.unwrap(), 12);
}

#[tokio::test]
async fn resume_without_a_checkpoint_is_a_no_op() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);

    assert!(matches!(
        h.coordinator.resume().await.unwrap(),
        ResumeOutcome::NothingToResume
    ));

    h.coordinator.start(None, false).await.unwrap();
    assert!(matches!(
        h.coordinator.resume().await.unwrap(),
        ResumeOutcome::AlreadyComplete { .. }
    ));
    assert!(h.store.put_calls().await.len() == 3);
}

#[tokio::test]
async fn paused_run_resumes() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);
    h.store
        .script([BatchResponse::Fail(TargetError::AccessDenied("denied".into()))])
        .await;
    h.coordinator.start(None, false).await.unwrap_err();

    h.coordinator.checkpoint_mut().pause().unwrap();
    assert!(matches!(
        h.coordinator.start(None, false).await.unwrap_err(),
        MigrationError::IncompleteRun { .. }
    ));

    let outcome = h.coordinator.resume().await.unwrap();
    assert!(matches!(outcome, ResumeOutcome::Resumed(_)));
    assert_eq!(h.store.items("coll_tracks").await.len(), 3);
}

#[tokio::test]
async fn forced_start_clears_every_collection_before_writing() {
    let dir = tempdir().unwrap();
    let mut h = harness(dir.path(), music_source(), 25, 0);
    // Left over from an earlier run of the last group.
    h.store
        .ensure_collection(&CollectionSchema::keyed("coll_tracks"))
        .await
        .unwrap();
    h.store
        .batch_put("coll_tracks", &[Item::new("STALE#1", "COPY#0", "Track")])
        .await
        .unwrap();
    h.store
        .script([BatchResponse::Fail(TargetError::AccessDenied("denied".into()))])
        .await;

    h.coordinator.start(None, true).await.unwrap_err();
    assert!(h.store.items("coll_tracks").await.is_empty());

    h.coordinator.resume().await.unwrap();

    let run = h.coordinator.checkpoint_mut().load().unwrap().unwrap();
    for (name, group) in &run.groups {
        let stored = h.store.item_count(&format!("coll_{name}")).await.unwrap();
        assert_eq!(stored, group.migrated_records, "{name}");
    }
    assert_eq!(run.groups["tracks"].migrated_records, 3);
}

#[tokio::test]
async fn provisioning_failure_is_recorded_on_its_group() {
    let dir = tempdir().unwrap();
    // Collections never leave Creating within the provisioning timeout.
    let store = Arc::new(MemoryTargetStore::new().with_provisioning_polls(10_000));
    let source = MemorySource::new("music.db")
        .with_table("Artist", rows(2))
        .with_group(group("artists", "Artist", 0));

    let mut coordinator = MigrationCoordinator::new(
        Arc::new(source),
        CheckpointStore::new(dir.path().join("state.json")),
        BatchWriter::new(store.clone(), 25, RetryPolicy::immediate(0)),
        Provisioner::new(store.clone(), Duration::from_millis(1), Duration::from_millis(5)),
    )
    .with_group(
        "artists",
        GroupPlan::new(CollectionSchema::keyed("coll_artists"), per_row("Artist", 1)),
    );

    let err = coordinator.start(None, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::Provisioning(_)));

    let run = coordinator.checkpoint_mut().load().unwrap().unwrap();
    assert_eq!(run.status, MigrationStatus::InProgress);
    let artists = &run.groups["artists"];
    assert_eq!(artists.status, MigrationStatus::NotStarted);
    assert_eq!(artists.error_count, 1);
    assert!(store.put_calls().await.is_empty());
}

#[tokio::test]
async fn empty_group_completes_at_zero_of_zero() {
    let dir = tempdir().unwrap();
    let source = MemorySource::new("music.db")
        .with_table("Artist", rows(2))
        .with_table("Album", rows(0))
        .with_table("Track", rows(1))
        .with_group(group("artists", "Artist", 0))
        .with_group(group("albums", "Album", 0))
        .with_group(group("tracks", "Track", 1));
    let mut h = harness(dir.path(), source, 25, 0);

    let summary = h.coordinator.start(None, false).await.unwrap();

    assert_eq!(summary.groups, vec!["albums", "artists", "tracks"]);
    let run = h.coordinator.checkpoint_mut().load().unwrap().unwrap();
    let albums = &run.groups["albums"];
    assert_eq!(albums.status, MigrationStatus::Completed);
    assert_eq!((albums.migrated_records, albums.total_records), (0, 0));
    assert!(h.store.schema("coll_albums").await.is_some());
}
