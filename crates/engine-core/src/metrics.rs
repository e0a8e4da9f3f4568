use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    batches_sent: AtomicU64,
    records_requested: AtomicU64,
    transport_failures: AtomicU64,
    remote_errors: AtomicU64,
    asset_requests: AtomicU64,
    assets_processed: AtomicU64,
    assets_failed: AtomicU64,
}

/// Counters of one run, shared by every component of that run.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub batches_sent: u64,
    pub records_requested: u64,
    pub transport_failures: u64,
    pub remote_errors: u64,
    pub asset_requests: u64,
    pub assets_processed: u64,
    pub assets_failed: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One paced fetch/write request asking for `limit` records.
    pub fn record_batch(&self, limit: u64) {
        self.inner.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_requested
            .fetch_add(limit, Ordering::Relaxed);
    }

    pub fn increment_transport_failures(&self, count: u64) {
        self.inner
            .transport_failures
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_remote_errors(&self, count: u64) {
        self.inner.remote_errors.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_asset_requests(&self, count: u64) {
        self.inner.asset_requests.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_assets_processed(&self, count: u64) {
        self.inner
            .assets_processed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_assets_failed(&self, count: u64) {
        self.inner.assets_failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Zeroes every counter. Called when a new run starts.
    pub fn reset(&self) {
        for counter in [
            &self.inner.batches_sent,
            &self.inner.records_requested,
            &self.inner.transport_failures,
            &self.inner.remote_errors,
            &self.inner.asset_requests,
            &self.inner.assets_processed,
            &self.inner.assets_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_sent: self.inner.batches_sent.load(Ordering::Relaxed),
            records_requested: self.inner.records_requested.load(Ordering::Relaxed),
            transport_failures: self.inner.transport_failures.load(Ordering::Relaxed),
            remote_errors: self.inner.remote_errors.load(Ordering::Relaxed),
            asset_requests: self.inner.asset_requests.load(Ordering::Relaxed),
            assets_processed: self.inner.assets_processed.load(Ordering::Relaxed),
            assets_failed: self.inner.assets_failed.load(Ordering::Relaxed),
        }
    }
}
