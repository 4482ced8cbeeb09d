use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_in: AtomicU64,
    rows_out: AtomicU64,
    batches_written: AtomicU64,
    bytes_written: AtomicU64,
}

/// Per-worker row counters, shared between the worker task and the pool.
///
/// `rows_in` is bumped before a batch is handed to the stream, so rows lost
/// in a failed write still count as input.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rows_in: u64,
    pub rows_out: u64,
    pub batches_written: u64,
    pub bytes_written: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_rows_in(&self, count: u64) {
        self.inner.rows_in.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_out(&self, count: u64) {
        self.inner.rows_out.fetch_add(count, Ordering::Relaxed);
    }

    /// Replaces the acknowledged count with the stream's final committed count.
    pub fn set_rows_out(&self, count: u64) {
        self.inner.rows_out.store(count, Ordering::Relaxed);
    }

    pub fn record_batch(&self, bytes: u64) {
        self.inner.batches_written.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_in: self.inner.rows_in.load(Ordering::Relaxed),
            rows_out: self.inner.rows_out.load(Ordering::Relaxed),
            batches_written: self.inner.batches_written.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
