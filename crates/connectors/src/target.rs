use crate::error::TargetError;
use async_trait::async_trait;
use model::{
    records::item::Item,
    schema::collection::{CollectionSchema, CollectionStatus},
};

/// Hard per-request item limit of the target store's batch-put primitive.
pub const MAX_BATCH_ITEMS: usize = 25;

/// Client for the schema-flexible key-value target.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Largest batch a single `batch_put` call accepts.
    fn batch_limit(&self) -> usize {
        MAX_BATCH_ITEMS
    }

    /// Idempotent create: succeeds if the collection already exists.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), TargetError>;

    /// Starts deleting a collection. Deleting a missing collection is not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), TargetError>;

    async fn describe_status(&self, name: &str) -> Result<CollectionStatus, TargetError>;

    /// Puts a batch of items and returns the subset the store did not process.
    async fn batch_put(&self, collection: &str, items: &[Item]) -> Result<Vec<Item>, TargetError>;

    async fn item_count(&self, collection: &str) -> Result<u64, TargetError>;

    async fn scan(&self, collection: &str, limit: Option<usize>)
    -> Result<Vec<Item>, TargetError>;
}
