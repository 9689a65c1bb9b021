pub mod coordinator;
pub mod factory;

pub use coordinator::{GroupPlan, MigrationCoordinator, ResumeOutcome, RunSummary};
