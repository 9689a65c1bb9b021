use crate::{error::WriteError, retry::classify_target_error};
use connectors::{error::TargetError, target::TargetStore};
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryPolicy},
};
use model::records::item::Item;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of pushing items through the writer.
///
/// `unresolved` holds the items still unprocessed after the retry budget ran out;
/// the writer returns them rather than dropping them.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: usize,
    pub unresolved: Vec<Item>,
    pub retries: usize,
    pub delays: Vec<Duration>,
}

impl WriteOutcome {
    pub fn fully_succeeded(&self) -> bool {
        self.unresolved.is_empty()
    }

    fn absorb(&mut self, other: WriteOutcome) {
        self.written += other.written;
        self.unresolved.extend(other.unresolved);
        self.retries += other.retries;
        self.delays.extend(other.delays);
    }
}

pub struct BatchWriter {
    target: Arc<dyn TargetStore>,
    retry: RetryPolicy,
    chunk_size: usize,
    metrics: Metrics,
}

impl BatchWriter {
    pub fn new(target: Arc<dyn TargetStore>, batch_size: usize, retry: RetryPolicy) -> Self {
        let chunk_size = batch_size.clamp(1, target.batch_limit().max(1));
        BatchWriter {
            target,
            retry,
            chunk_size,
            metrics: Metrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Writes `items` in request-sized chunks, in order.
    pub async fn write(
        &self,
        collection: &str,
        items: Vec<Item>,
    ) -> Result<WriteOutcome, WriteError> {
        let mut outcome = WriteOutcome::default();
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let chunk: Vec<Item> = items.by_ref().take(self.chunk_size).collect();
            outcome.absorb(self.write_chunk(collection, chunk).await?);
        }

        Ok(outcome)
    }

    /// Writes one chunk of at most the batch limit.
    ///
    /// A partial acceptance narrows the next request to the unprocessed subset.
    /// Throttling and availability errors resend whatever is still pending.
    /// Any other error aborts the chunk.
    pub async fn write_chunk(
        &self,
        collection: &str,
        items: Vec<Item>,
    ) -> Result<WriteOutcome, WriteError> {
        let mut outcome = WriteOutcome::default();
        let mut pending = items;
        let mut attempt = 0;

        while !pending.is_empty() {
            match self.target.batch_put(collection, &pending).await {
                Ok(unprocessed) => {
                    let accepted = pending.len().saturating_sub(unprocessed.len());
                    outcome.written += accepted;
                    self.metrics.increment_items(accepted as u64);
                    self.metrics.increment_batches(1);
                    debug!(collection, accepted, unprocessed = unprocessed.len(), "Batch written");
                    pending = unprocessed;
                    if pending.is_empty() {
                        break;
                    }
                }
                Err(err) => match classify_target_error(&err) {
                    RetryDisposition::Stop => {
                        return Err(WriteError::Rejected {
                            collection: collection.to_string(),
                            source: err,
                        });
                    }
                    RetryDisposition::Retry => {
                        if matches!(err, TargetError::Throttled(_)) {
                            self.metrics.increment_throttles(1);
                        }
                        debug!(collection, error = %err, "Batch request failed transiently");
                    }
                },
            }

            if attempt >= self.retry.max_retries {
                warn!(
                    collection,
                    unresolved = pending.len(),
                    retries = attempt,
                    "Giving up on unprocessed items"
                );
                self.metrics.increment_unresolved(pending.len() as u64);
                outcome.unresolved = pending;
                break;
            }

            let delay = self.retry.backoff_delay(attempt);
            warn!(
                collection,
                attempt = attempt + 1,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying batch"
            );
            self.metrics.increment_retries(1);
            outcome.retries += 1;
            outcome.delays.push(delay);
            sleep(delay).await;
            attempt += 1;
        }

        Ok(outcome)
    }
}
