#[cfg(test)]
mod tests {
    use crate::{
        CHINOOK_CUSTOMER_ITEMS, CHINOOK_EMPLOYEE_ITEMS, CHINOOK_MUSIC_ITEMS,
        CHINOOK_PLAYLIST_ITEMS, seed_chinook,
    };
    use connectors::{
        kv::sled::SledTargetStore,
        source::SourceProvider,
        target::TargetStore,
    };
    use engine_config::settings::{MigrationConfig, TargetConfig};
    use engine_core::{metrics::Metrics, state::MigrationStatus};
    use engine_runtime::{
        execution::factory,
        validation::{self, SAMPLE_SIZE},
    };
    use model::{
        core::value::Value,
        records::item::{Item, ItemKey},
    };
    use std::{path::Path, sync::Arc};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn config(dir: &Path) -> MigrationConfig {
        let db = dir.join("chinook.db");
        seed_chinook(&db);

        let mut config = MigrationConfig::new(&db).unwrap();
        config.state_dir = dir.join("state");
        config.target = TargetConfig::Sled {
            path: dir.join("kv"),
        };
        config.provisioning.poll_interval_ms = 10;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 10;
        config
    }

    fn get(store: &SledTargetStore, collection: &str, pk: &str, sk: &str) -> Item {
        let key = ItemKey {
            pk: pk.into(),
            sk: sk.into(),
        };
        store
            .get(collection, &key)
            .unwrap()
            .unwrap_or_else(|| panic!("{collection} has no item {key}"))
    }

    #[traced_test]
    #[tokio::test]
    async fn chinook_fixture_migrates_into_sled() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        config.save(dir.path().join("migration.json")).unwrap();
        let config = MigrationConfig::load(dir.path().join("migration.json")).unwrap();

        let source = factory::create_source(&config).unwrap();
        let TargetConfig::Sled { path } = &config.target else {
            unreachable!();
        };
        let sled = Arc::new(SledTargetStore::open(path).unwrap());
        let mut coordinator =
            factory::create_coordinator(&config, source.clone(), sled.clone(), Metrics::new())
                .unwrap();

        let summary = coordinator.start(None, false).await.unwrap();

        assert_eq!(summary.status, MigrationStatus::Completed);
        assert_eq!(
            summary.migrated_records,
            CHINOOK_MUSIC_ITEMS
                + CHINOOK_CUSTOMER_ITEMS
                + CHINOOK_PLAYLIST_ITEMS
                + CHINOOK_EMPLOYEE_ITEMS
        );
        // employee_data has no dependencies; playlist_data depends on everything
        assert_eq!(summary.groups.first().map(String::as_str), Some("employee_data"));
        assert_eq!(summary.groups.last().map(String::as_str), Some("playlist_data"));

        let music = "chinook_MusicCatalog";
        assert_eq!(sled.item_count(music).await.unwrap(), CHINOOK_MUSIC_ITEMS);

        let album = get(&sled, music, "ALBUM#3", "METADATA");
        assert_eq!(album.entity_type, "Album");
        assert_eq!(album.get("ArtistName"), Some(&Value::from("AC/DC")));
        assert_eq!(album.get("GSI1SK"), Some(&Value::from("ALBUM#LET THERE BE ROCK")));

        let track = get(&sled, music, "TRACK#3", "METADATA");
        assert_eq!(track.get("GenreName"), Some(&Value::from("Rock")));
        assert_eq!(track.get("ArtistName"), Some(&Value::from("AC/DC")));

        let loose = get(&sled, music, "TRACK#4", "METADATA");
        assert!(loose.get("GSI1PK").is_none());
        assert!(loose.get("GenreName").is_none());
        assert_eq!(loose.get("MediaTypeName"), Some(&Value::from("MPEG audio file")));

        let invoice = get(&sled, "chinook_CustomerData", "CUSTOMER#2", "INVOICE#1");
        assert_eq!(invoice.get("LineCount"), Some(&Value::Int(2)));

        let customer = get(&sled, "chinook_CustomerData", "CUSTOMER#1", "PROFILE");
        assert_eq!(customer.get("GSI1PK"), Some(&Value::from("luisg@embraer.com.br")));
        assert_eq!(customer.get("SupportRepName"), Some(&Value::from("Jane Peacock")));

        let boss = get(&sled, "chinook_EmployeeData", "EMPLOYEE#1", "PROFILE");
        assert!(boss.get("ManagerName").is_none());
        let report = get(&sled, "chinook_EmployeeData", "EMPLOYEE#3", "PROFILE");
        assert_eq!(report.get("ManagerName"), Some(&Value::from("Nancy Edwards")));

        let entry = get(&sled, "chinook_PlaylistData", "PLAYLIST#2", "TRACK#2");
        assert_eq!(entry.get("ArtistName"), Some(&Value::from("Accept")));

        assert!(logs_contain("Migration run finished"));
    }

    #[tokio::test]
    async fn validation_report_matches_a_finished_run() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let source = factory::create_source(&config).unwrap();
        let target = factory::create_target(&config).unwrap();
        let mut coordinator =
            factory::create_coordinator(&config, source.clone(), target.clone(), Metrics::new())
                .unwrap();

        let before = validation::validate(
            source.as_ref(),
            target.as_ref(),
            None,
            &factory::validation_targets(&config),
        )
        .await
        .unwrap();
        assert!(!before.valid);

        coordinator.start(None, false).await.unwrap();
        let run = coordinator.checkpoint().run().cloned();

        let report = validation::validate(
            source.as_ref(),
            target.as_ref(),
            run.as_ref(),
            &factory::validation_targets(&config),
        )
        .await
        .unwrap();

        assert!(report.valid, "{:?}", report.groups);
        assert_eq!(report.source, source.identity());
        assert_eq!(report.groups.len(), 4);
        assert!(report.groups.iter().all(|g| g.sampled <= SAMPLE_SIZE));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], true);
    }

    #[tokio::test]
    async fn selected_groups_and_forced_restart() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let source = factory::create_source(&config).unwrap();
        let target = factory::create_target(&config).unwrap();
        let mut coordinator =
            factory::create_coordinator(&config, source, target.clone(), Metrics::new()).unwrap();

        let selection = vec!["employee_data".to_string()];
        let summary = coordinator.start(Some(&selection), false).await.unwrap();
        assert_eq!(summary.migrated_records, CHINOOK_EMPLOYEE_ITEMS);

        let again = coordinator.start(Some(&selection), true).await.unwrap();
        assert_ne!(again.run_id, summary.run_id);
        assert_eq!(
            target.item_count("chinook_EmployeeData").await.unwrap(),
            CHINOOK_EMPLOYEE_ITEMS
        );
        assert!(config.checkpoint_path().is_file());
    }
}
