use crate::{defaults, error::ConfigError, mapping::GroupConfig};
use connectors::{source::GroupLayout, target::MAX_BATCH_ITEMS};
use engine_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config/migration.json";

const ENV_SOURCE_DB: &str = "MIGRATION_SOURCE_DB";
const ENV_BATCH_SIZE: &str = "MIGRATION_BATCH_SIZE";
const ENV_TABLE_PREFIX: &str = "MIGRATION_TABLE_PREFIX";
const ENV_STATE_DIR: &str = "MIGRATION_STATE_DIR";

/// Where migrated items are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    /// Embedded store persisted under `path`.
    Sled { path: PathBuf },
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::Sled {
            path: PathBuf::from("data/kvstore"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        ProvisioningSettings {
            poll_interval_ms: 5_000,
            timeout_secs: 300,
        }
    }
}

impl ProvisioningSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_batch_size() -> usize {
    MAX_BATCH_ITEMS
}

/// Complete configuration of a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub source_db: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub table_prefix: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
    pub groups: Vec<GroupConfig>,
}

impl MigrationConfig {
    /// Default configuration for a Chinook-style database.
    pub fn new(source_db: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(MigrationConfig {
            source_db: source_db.into(),
            state_dir: default_state_dir(),
            target: TargetConfig::default(),
            table_prefix: "chinook_".to_string(),
            batch_size: default_batch_size(),
            retry: RetrySettings::default(),
            provisioning: ProvisioningSettings::default(),
            groups: defaults::chinook_groups()?,
        })
    }

    /// Reads, overrides from the process environment, and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: MigrationConfig = serde_json::from_str(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        debug!(path = %path.display(), groups = config.groups.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies `MIGRATION_*` overrides. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(source_db) = get(ENV_SOURCE_DB) {
            self.source_db = PathBuf::from(source_db);
        }
        if let Some(batch_size) = get(ENV_BATCH_SIZE) {
            self.batch_size = batch_size.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_BATCH_SIZE.to_string(),
                value: batch_size.clone(),
            })?;
        }
        if let Some(prefix) = get(ENV_TABLE_PREFIX) {
            self.table_prefix = prefix;
        }
        if let Some(state_dir) = get(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(state_dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_db.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("source_db is required".into()));
        }
        if !self.source_db.is_file() {
            return Err(ConfigError::Invalid(format!(
                "source database file not found: {}",
                self.source_db.display()
            )));
        }
        if !(1..=MAX_BATCH_ITEMS).contains(&self.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "batch_size must be between 1 and {MAX_BATCH_ITEMS}, got {}",
                self.batch_size
            )));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".into(),
            ));
        }
        if self.provisioning.timeout_secs == 0 || self.provisioning.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "provisioning timeout and poll interval must be positive".into(),
            ));
        }
        if let TargetConfig::Sled { path } = &self.target
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("target.path is required for sled".into()));
        }

        if self.groups.is_empty() {
            return Err(ConfigError::Invalid("at least one group is required".into()));
        }
        let mut names = BTreeSet::new();
        let mut collections = BTreeSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate group '{}'", group.name)));
            }
            if !collections.insert(group.collection.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "collection '{}' is used by more than one group",
                    group.collection
                )));
            }
            group.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_layouts(&self) -> Vec<GroupLayout> {
        self.groups.iter().map(GroupConfig::layout).collect()
    }

    pub fn collection_name(&self, group: &GroupConfig) -> String {
        format!("{}{}", self.table_prefix, group.collection)
    }

    /// `<state_dir>/<source stem>_migration_state.json`
    pub fn checkpoint_path(&self) -> PathBuf {
        let stem = self
            .source_db
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        self.state_dir.join(format!("{stem}_migration_state.json"))
    }
}
