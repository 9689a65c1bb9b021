use crate::state::models::MigrationStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The checkpoint file exists but cannot be trusted. Never recovered
    /// automatically; an operator has to reset the run.
    #[error("Checkpoint file {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Invalid status transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: MigrationStatus,
        to: MigrationStatus,
    },

    #[error("No migration run is loaded")]
    NoActiveRun,

    #[error("Group {group} cannot report {migrated} migrated records out of {total}")]
    ProgressOverflow {
        group: String,
        migrated: u64,
        total: u64,
    },

    #[error("Run cannot complete while groups are unfinished: {0:?}")]
    GroupsIncomplete(Vec<String>),
}
