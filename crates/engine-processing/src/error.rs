use connectors::error::TargetError;
use model::schema::collection::CollectionStatus;
use std::time::Duration;
use thiserror::Error;

/// A write the target refused outright. Never retried.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Target rejected batch for collection '{collection}': {source}")]
    Rejected {
        collection: String,
        #[source]
        source: TargetError,
    },
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Timed out after {waited:?} waiting for collection '{collection}' to become {expected}")]
    Timeout {
        collection: String,
        expected: CollectionStatus,
        waited: Duration,
    },

    #[error("Failed to provision collection '{collection}': {source}")]
    Target {
        collection: String,
        #[source]
        source: TargetError,
    },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Source table '{0}' was not provided to the transform")]
    MissingTable(String),

    #[error("{entity} row has no value for key template '{template}'")]
    MissingKey { entity: String, template: String },

    #[error("Transformation failed: {0}")]
    Transformation(String),
}
