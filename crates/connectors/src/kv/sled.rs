use crate::{
    error::TargetError,
    target::{MAX_BATCH_ITEMS, TargetStore},
};
use async_trait::async_trait;
use model::{
    records::item::{Item, ItemKey},
    schema::collection::{CollectionSchema, CollectionStatus},
};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_TREE: &str = "__collections";
const KEY_SEPARATOR: char = '\u{1f}';

/// Embedded key-value target backed by sled.
///
/// Each collection lives in its own tree; declared schemas are kept in a
/// separate tree so that `describe_status` survives restarts.
pub struct SledTargetStore {
    db: sled::Db,
}

impl SledTargetStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TargetError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn tree_name(collection: &str) -> String {
        format!("coll:{collection}")
    }

    #[inline]
    fn item_key(key: &ItemKey) -> String {
        format!("{}{KEY_SEPARATOR}{}", key.pk, key.sk)
    }

    fn schemas(&self) -> Result<sled::Tree, TargetError> {
        Ok(self.db.open_tree(SCHEMA_TREE)?)
    }

    /// Opens a collection tree, failing if the collection was never created.
    fn collection(&self, name: &str) -> Result<sled::Tree, TargetError> {
        if !self.schemas()?.contains_key(name)? {
            return Err(TargetError::CollectionNotFound(name.to_string()));
        }
        Ok(self.db.open_tree(Self::tree_name(name))?)
    }

    pub fn schema(&self, name: &str) -> Result<Option<CollectionSchema>, TargetError> {
        match self.schemas()?.get(name)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, collection: &str, key: &ItemKey) -> Result<Option<Item>, TargetError> {
        match self.collection(collection)?.get(Self::item_key(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TargetStore for SledTargetStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), TargetError> {
        let schemas = self.schemas()?;
        if schemas.contains_key(&schema.name)? {
            debug!(collection = %schema.name, "Collection already exists");
            return Ok(());
        }

        schemas.insert(schema.name.as_str(), serde_json::to_vec(schema)?)?;
        self.db.open_tree(Self::tree_name(&schema.name))?;
        self.db.flush_async().await?;

        info!(collection = %schema.name, indexes = schema.indexes.len(), "Created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), TargetError> {
        let schemas = self.schemas()?;
        if schemas.remove(name)?.is_none() {
            return Ok(());
        }
        self.db.drop_tree(Self::tree_name(name))?;
        self.db.flush_async().await?;

        info!(collection = %name, "Deleted collection");
        Ok(())
    }

    async fn describe_status(&self, name: &str) -> Result<CollectionStatus, TargetError> {
        if self.schemas()?.contains_key(name)? {
            Ok(CollectionStatus::Active)
        } else {
            Ok(CollectionStatus::Missing)
        }
    }

    async fn batch_put(&self, collection: &str, items: &[Item]) -> Result<Vec<Item>, TargetError> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(TargetError::Validation(format!(
                "batch of {} items exceeds the limit of {MAX_BATCH_ITEMS}",
                items.len()
            )));
        }

        let tree = self.collection(collection)?;
        let mut batch = sled::Batch::default();
        for item in items {
            batch.insert(Self::item_key(&item.key()).as_bytes(), serde_json::to_vec(item)?);
        }
        tree.apply_batch(batch)?;
        tree.flush_async().await?;

        Ok(Vec::new())
    }

    async fn item_count(&self, collection: &str) -> Result<u64, TargetError> {
        Ok(self.collection(collection)?.len() as u64)
    }

    async fn scan(
        &self,
        collection: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Item>, TargetError> {
        let tree = self.collection(collection)?;
        let mut items = Vec::new();
        for entry in tree.iter() {
            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            let (_key, value) = entry?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }
}
