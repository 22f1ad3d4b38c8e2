//! # Metrics
//!
//! Atomic operation counters shared across CubeDB components.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Store metrics
    store_reads: AtomicU64,
    store_writes: AtomicU64,
    store_queries: AtomicU64,

    // Batch write metrics
    batch_chunks_written: AtomicU64,
    batch_retries: AtomicU64,

    // Hash index metrics
    hash_rows_written: AtomicU64,
    hash_rows_deleted: AtomicU64,

    // Search metrics
    searches_executed: AtomicU64,
    hash_scans: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_store_read(&self) {
        self.inner.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_write(&self) {
        self.inner.store_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_query(&self) {
        self.inner.store_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_chunk(&self) {
        self.inner
            .batch_chunks_written
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_retry(&self) {
        self.inner.batch_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hash_rows_written(&self, count: u64) {
        self.inner
            .hash_rows_written
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_hash_rows_deleted(&self, count: u64) {
        self.inner
            .hash_rows_deleted
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.inner.searches_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hash_scan(&self) {
        self.inner.hash_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            store_reads: self.inner.store_reads.load(Ordering::Relaxed),
            store_writes: self.inner.store_writes.load(Ordering::Relaxed),
            store_queries: self.inner.store_queries.load(Ordering::Relaxed),
            batch_chunks_written: self.inner.batch_chunks_written.load(Ordering::Relaxed),
            batch_retries: self.inner.batch_retries.load(Ordering::Relaxed),
            hash_rows_written: self.inner.hash_rows_written.load(Ordering::Relaxed),
            hash_rows_deleted: self.inner.hash_rows_deleted.load(Ordering::Relaxed),
            searches_executed: self.inner.searches_executed.load(Ordering::Relaxed),
            hash_scans: self.inner.hash_scans.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub store_reads: u64,
    pub store_writes: u64,
    pub store_queries: u64,
    pub batch_chunks_written: u64,
    pub batch_retries: u64,
    pub hash_rows_written: u64,
    pub hash_rows_deleted: u64,
    pub searches_executed: u64,
    pub hash_scans: u64,
}
