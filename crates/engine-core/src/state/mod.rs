//! Durable, file-backed record of a migration run.

pub mod json_store;
pub mod models;

pub use json_store::CheckpointStore;
pub use models::{GroupProgress, MigrationRun, MigrationStatus, ResumeEntry, ResumeInfo};
