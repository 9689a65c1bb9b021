use crate::{
    error::TargetError,
    target::{MAX_BATCH_ITEMS, TargetStore},
};
use async_trait::async_trait;
use model::{
    records::item::{Item, ItemKey},
    schema::collection::{CollectionSchema, CollectionStatus},
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::Mutex;

/// Scripted outcome for the next `batch_put` call.
#[derive(Debug, Clone)]
pub enum BatchResponse {
    /// Store every item.
    Accept,
    /// Store nothing and hand the whole batch back as unprocessed.
    RejectAll,
    /// Store all but the first `n` items, which come back as unprocessed.
    RejectFirst(usize),
    /// Fail the request without storing anything.
    Fail(TargetError),
}

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    status: CollectionStatus,
    polls_left: usize,
    items: BTreeMap<ItemKey, Item>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Collection>,
    responses: VecDeque<BatchResponse>,
    put_calls: Vec<usize>,
}

/// In-memory target store with scriptable failures.
///
/// Collections can be made to linger in `Creating`/`Deleting` for a number of
/// `describe_status` calls, and each `batch_put` consumes the next scripted
/// [`BatchResponse`] (defaulting to [`BatchResponse::Accept`]).
#[derive(Debug, Default)]
pub struct MemoryTargetStore {
    state: Mutex<State>,
    provisioning_polls: usize,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of status polls a collection stays in a transitional state.
    pub fn with_provisioning_polls(mut self, polls: usize) -> Self {
        self.provisioning_polls = polls;
        self
    }

    pub async fn script(&self, responses: impl IntoIterator<Item = BatchResponse>) {
        self.state.lock().await.responses.extend(responses);
    }

    /// Sizes of every `batch_put` request received so far.
    pub async fn put_calls(&self) -> Vec<usize> {
        self.state.lock().await.put_calls.clone()
    }

    pub async fn items(&self, collection: &str) -> Vec<Item> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map(|c| c.items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map(|c| c.schema.clone())
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), TargetError> {
        let mut state = self.state.lock().await;
        match state.collections.get(&schema.name) {
            Some(existing) if existing.status == CollectionStatus::Deleting => {
                Err(TargetError::CollectionInUse(schema.name.clone()))
            }
            Some(_) => Ok(()),
            None => {
                let status = if self.provisioning_polls > 0 {
                    CollectionStatus::Creating
                } else {
                    CollectionStatus::Active
                };
                state.collections.insert(
                    schema.name.clone(),
                    Collection {
                        schema: schema.clone(),
                        status,
                        polls_left: self.provisioning_polls,
                        items: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<(), TargetError> {
        let mut state = self.state.lock().await;
        if self.provisioning_polls == 0 {
            state.collections.remove(name);
            return Ok(());
        }
        if let Some(collection) = state.collections.get_mut(name) {
            collection.status = CollectionStatus::Deleting;
            collection.polls_left = self.provisioning_polls;
            collection.items.clear();
        }
        Ok(())
    }

    async fn describe_status(&self, name: &str) -> Result<CollectionStatus, TargetError> {
        let mut state = self.state.lock().await;
        let Some(collection) = state.collections.get_mut(name) else {
            return Ok(CollectionStatus::Missing);
        };

        if collection.polls_left > 0 {
            collection.polls_left -= 1;
            return Ok(collection.status);
        }

        let status = collection.status;
        match status {
            CollectionStatus::Creating => {
                collection.status = CollectionStatus::Active;
                Ok(CollectionStatus::Active)
            }
            CollectionStatus::Deleting => {
                state.collections.remove(name);
                Ok(CollectionStatus::Missing)
            }
            other => Ok(other),
        }
    }

    async fn batch_put(&self, collection: &str, items: &[Item]) -> Result<Vec<Item>, TargetError> {
        let mut state = self.state.lock().await;
        state.put_calls.push(items.len());

        if items.len() > MAX_BATCH_ITEMS {
            return Err(TargetError::Validation(format!(
                "batch of {} items exceeds the limit of {MAX_BATCH_ITEMS}",
                items.len()
            )));
        }

        let response = state.responses.pop_front().unwrap_or(BatchResponse::Accept);
        let target = match state.collections.get_mut(collection) {
            Some(c) if c.status == CollectionStatus::Active => c,
            Some(_) => return Err(TargetError::CollectionInUse(collection.to_string())),
            None => return Err(TargetError::CollectionNotFound(collection.to_string())),
        };

        let rejected = match response {
            BatchResponse::Accept => 0,
            BatchResponse::RejectAll => items.len(),
            BatchResponse::RejectFirst(n) => n.min(items.len()),
            BatchResponse::Fail(err) => return Err(err),
        };

        for item in &items[rejected..] {
            target.items.insert(item.key(), item.clone());
        }
        Ok(items[..rejected].to_vec())
    }

    async fn item_count(&self, collection: &str) -> Result<u64, TargetError> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map(|c| c.items.len() as u64)
            .ok_or_else(|| TargetError::CollectionNotFound(collection.to_string()))
    }

    async fn scan(
        &self,
        collection: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Item>, TargetError> {
        let state = self.state.lock().await;
        let target = state
            .collections
            .get(collection)
            .ok_or_else(|| TargetError::CollectionNotFound(collection.to_string()))?;
        let take = limit.unwrap_or(usize::MAX);
        Ok(target.items.values().take(take).cloned().collect())
    }
}
