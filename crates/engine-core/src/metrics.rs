use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    items_written: AtomicU64,
    batches_written: AtomicU64,
    retry_count: AtomicU64,
    throttle_count: AtomicU64,
    unresolved_count: AtomicU64,
}

/// Write-path counters shared by every batch writer of a run.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub items_written: u64,
    pub batches_written: u64,
    pub retry_count: u64,
    pub throttle_count: u64,
    pub unresolved_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_items(&self, count: u64) {
        self.inner.items_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_written
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_throttles(&self, count: u64) {
        self.inner.throttle_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_unresolved(&self, count: u64) {
        self.inner
            .unresolved_count
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_written: self.inner.items_written.load(Ordering::Relaxed),
            batches_written: self.inner.batches_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            throttle_count: self.inner.throttle_count.load(Ordering::Relaxed),
            unresolved_count: self.inner.unresolved_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
