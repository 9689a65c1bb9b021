use crate::error::ProvisioningError;
use connectors::{error::TargetError, target::TargetStore};
use model::schema::collection::{CollectionSchema, CollectionStatus};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{debug, info};

/// Creates target collections and waits for them to settle.
pub struct Provisioner {
    target: Arc<dyn TargetStore>,
    poll_interval: Duration,
    timeout: Duration,
}

impl Provisioner {
    pub fn new(target: Arc<dyn TargetStore>, poll_interval: Duration, timeout: Duration) -> Self {
        Provisioner {
            target,
            poll_interval,
            timeout,
        }
    }

    /// Makes sure `schema` exists and is active.
    ///
    /// With `force_recreate` an existing collection is deleted first, and the
    /// call waits until the store reports it gone before creating it again.
    pub async fn ensure_collection(
        &self,
        schema: &CollectionSchema,
        force_recreate: bool,
    ) -> Result<(), ProvisioningError> {
        let name = schema.name.as_str();
        let status = self.status(name).await?;

        if force_recreate && status != CollectionStatus::Missing {
            info!(collection = name, "Dropping existing collection");
            self.target
                .delete_collection(name)
                .await
                .map_err(|e| target_error(name, e))?;
            self.wait_for(name, CollectionStatus::Missing).await?;
        } else if status == CollectionStatus::Deleting {
            self.wait_for(name, CollectionStatus::Missing).await?;
        }

        self.target
            .ensure_collection(schema)
            .await
            .map_err(|e| target_error(name, e))?;
        self.wait_for(name, CollectionStatus::Active).await?;

        info!(collection = name, "Collection ready");
        Ok(())
    }

    /// Polls the store until `name` reaches `expected` or the timeout expires.
    pub async fn wait_for(
        &self,
        name: &str,
        expected: CollectionStatus,
    ) -> Result<(), ProvisioningError> {
        let started = Instant::now();

        loop {
            let status = self.status(name).await?;
            if status == expected {
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(ProvisioningError::Timeout {
                    collection: name.to_string(),
                    expected,
                    waited,
                });
            }

            debug!(collection = name, %status, %expected, "Waiting for collection");
            sleep(self.poll_interval).await;
        }
    }

    async fn status(&self, name: &str) -> Result<CollectionStatus, ProvisioningError> {
        self.target
            .describe_status(name)
            .await
            .map_err(|e| target_error(name, e))
    }
}

fn target_error(collection: &str, source: TargetError) -> ProvisioningError {
    ProvisioningError::Target {
        collection: collection.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::memory::target::MemoryTargetStore;
    use model::records::item::Item;

    fn provisioner(store: Arc<MemoryTargetStore>, timeout_ms: u64) -> Provisioner {
        Provisioner::new(store, Duration::from_millis(1), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn waits_until_the_collection_is_active() {
        let store = Arc::new(MemoryTargetStore::new().with_provisioning_polls(3));
        let schema = CollectionSchema::keyed("MusicCatalog");

        provisioner(store.clone(), 1_000)
            .ensure_collection(&schema, false)
            .await
            .unwrap();

        assert_eq!(
            store.describe_status("MusicCatalog").await.unwrap(),
            CollectionStatus::Active
        );
    }

    #[tokio::test]
    async fn times_out_when_the_collection_never_settles() {
        let store = Arc::new(MemoryTargetStore::new().with_provisioning_polls(10_000));
        let schema = CollectionSchema::keyed("Slow");

        let err = provisioner(store, 5)
            .ensure_collection(&schema, false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Timeout { expected: CollectionStatus::Active, .. }
        ));
    }

    #[tokio::test]
    async fn force_recreate_drops_existing_items() {
        let store = Arc::new(MemoryTargetStore::new().with_provisioning_polls(2));
        let schema = CollectionSchema::keyed("CustomerData");
        let provisioner = provisioner(store.clone(), 1_000);

        provisioner.ensure_collection(&schema, false).await.unwrap();
        store
            .batch_put("CustomerData", &[Item::new("CUSTOMER#1", "METADATA", "Customer")])
            .await
            .unwrap();

        provisioner.ensure_collection(&schema, false).await.unwrap();
        assert_eq!(store.item_count("CustomerData").await.unwrap(), 1);

        provisioner.ensure_collection(&schema, true).await.unwrap();
        assert_eq!(store.item_count("CustomerData").await.unwrap(), 0);
    }
}
