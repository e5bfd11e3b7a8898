//! Buffer counters for observability and tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of the coordinator's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    /// Records accepted by `enqueue` since creation.
    pub total_enqueued: u64,
    /// Records acknowledged by the backend.
    pub total_flushed: u64,
    /// Records currently waiting in the queue.
    pub current_size: usize,
    /// Time of the last acknowledged flush.
    pub last_flush_at: Option<DateTime<Utc>>,
    /// Asynchronous submissions that failed and were requeued.
    pub failed_flushes: u64,
    /// Records given up on during best-effort shutdown delivery.
    pub lost: u64,
    /// Records evicted because the queue was full.
    pub dropped: u64,
    /// Most recent transmission error.
    pub last_error: Option<String>,
}

/// Monotonic counters, created once per coordinator.
#[derive(Default)]
pub struct StatsTracker {
    inner: Mutex<BufferStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self, evicted: usize) {
        let mut stats = self.inner.lock();
        stats.total_enqueued += 1;
        stats.dropped += evicted as u64;
    }

    pub fn record_dropped(&self, evicted: usize) {
        if evicted > 0 {
            self.inner.lock().dropped += evicted as u64;
        }
    }

    pub fn record_flush_success(&self, count: usize) {
        let mut stats = self.inner.lock();
        stats.total_flushed += count as u64;
        stats.last_flush_at = Some(Utc::now());
    }

    pub fn record_flush_failure(&self, error: &str) {
        let mut stats = self.inner.lock();
        stats.failed_flushes += 1;
        stats.last_error = Some(error.to_string());
    }

    pub fn record_lost(&self, count: usize) {
        self.inner.lock().lost += count as u64;
    }

    /// Copy of the counters with `current_size` filled in by the caller.
    pub fn snapshot(&self, current_size: usize) -> BufferStats {
        let mut stats = self.inner.lock().clone();
        stats.current_size = current_size;
        stats
    }
}
