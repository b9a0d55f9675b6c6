use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_loaded: AtomicU64,
    bytes_loaded: AtomicU64,
    chunks_flushed: AtomicU64,
    failure_count: AtomicU64,
    retry_count: AtomicU64,
}

/// Counters shared by every writer task of one load job.
#[derive(Debug, Clone)]
pub struct LoadMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadMetricsSnapshot {
    pub rows_loaded: u64,
    pub bytes_loaded: u64,
    pub chunks_flushed: u64,
    pub failure_count: u64,
    pub retry_count: u64,
}

impl LoadMetrics {
    pub fn new() -> Self {
        LoadMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    /// Records one successfully flushed chunk.
    pub fn record_chunk(&self, rows: u64, bytes: u64) {
        self.inner.rows_loaded.fetch_add(rows, Ordering::Relaxed);
        self.inner.bytes_loaded.fetch_add(bytes, Ordering::Relaxed);
        self.inner.chunks_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LoadMetricsSnapshot {
        LoadMetricsSnapshot {
            rows_loaded: self.inner.rows_loaded.load(Ordering::Relaxed),
            bytes_loaded: self.inner.bytes_loaded.load(Ordering::Relaxed),
            chunks_flushed: self.inner.chunks_flushed.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for LoadMetrics {
    fn default() -> Self {
        Self::new()
    }
}
