use connectors::error::{SourceError, TargetError};
use engine_config::error::ConfigError;
use engine_core::error::CheckpointError;
use engine_processing::error::{ProvisioningError, TransformError, WriteError};
use thiserror::Error;

/// Top-level errors for a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// A resumable run exists and the caller did not ask to start over.
    #[error("Migration run {run_id} is still {status}; resume it or start with --force")]
    IncompleteRun { run_id: String, status: String },

    #[error("Group '{group}' left {count} items unwritten after retries")]
    UnresolvedItems { group: String, count: usize },

    #[error("Unknown group: {0}")]
    UnknownGroup(String),
}
