use engine_config::error::ConfigError;
use engine_core::error::CheckpointError;
use engine_runtime::error::MigrationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Configuration file {0} already exists; pass --force to overwrite it")]
    ConfigExists(String),

    #[error("Reset deletes the checkpoint and cannot be undone; rerun with --confirm")]
    ConfirmationRequired,

    #[error("No migration run found")]
    NoRun,

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Validation failed for {0} group(s)")]
    ValidationFailed(usize),
}
