//! Event queue for pending attempt records.

use crate::AttemptRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default upper bound on buffered records.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 500;

/// An ordered, non-empty group of records drained together.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Unique batch ID.
    pub batch_id: String,
    /// Records in enqueue order.
    records: Vec<AttemptRecord>,
}

impl Batch {
    fn new(records: Vec<AttemptRecord>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            records,
        })
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; a batch is never built empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<AttemptRecord> {
        self.records
    }
}

/// Result of appending one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// Queue length after the append.
    pub len: usize,
    /// Oldest records evicted to stay within the cap.
    pub evicted: usize,
}

/// FIFO buffer of pending attempts.
///
/// `append`, `drain_all` and `prepend_batch` share one lock, so a drain never
/// loses or duplicates a record appended concurrently.
pub struct EventQueue {
    max_len: usize,
    pending: Mutex<VecDeque<AttemptRecord>>,
}

impl EventQueue {
    /// Create a queue holding at most `max_len` records.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Append a record at the tail.
    pub fn append(&self, record: AttemptRecord) -> Appended {
        let mut pending = self.pending.lock();
        pending.push_back(record);
        let evicted = Self::evict_oldest(&mut pending, self.max_len);
        Appended {
            len: pending.len(),
            evicted,
        }
    }

    /// Remove every pending record as one batch.
    ///
    /// Returns None if nothing is pending.
    pub fn drain_all(&self) -> Option<Batch> {
        let records: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain(..).collect()
        };
        let batch = Batch::new(records)?;
        debug!(batch_id = %batch.batch_id, count = batch.len(), "Drained batch");
        Some(batch)
    }

    /// Put a failed batch back at the head, ahead of anything queued since.
    ///
    /// Returns how many records had to be evicted to respect the cap.
    pub fn prepend_batch(&self, batch: Batch) -> usize {
        let batch_id = batch.batch_id.clone();
        let mut pending = self.pending.lock();
        for record in batch.into_records().into_iter().rev() {
            pending.push_front(record);
        }
        let evicted = Self::evict_oldest(&mut pending, self.max_len);
        debug!(batch_id = %batch_id, queued = pending.len(), "Batch returned to queue head");
        evicted
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn evict_oldest(pending: &mut VecDeque<AttemptRecord>, max_len: usize) -> usize {
        let overflow = pending.len().saturating_sub(max_len);
        if overflow > 0 {
            pending.drain(..overflow);
            warn!(evicted = overflow, max_len, "Queue full, evicted oldest records");
        }
        overflow
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttemptPayload, WordAttempt};
    use std::sync::Arc;

    fn record(seq: u64) -> AttemptRecord {
        AttemptRecord::new(
            "session-1",
            "hangman",
            AttemptPayload::Word(WordAttempt {
                word_text: format!("word-{}", seq),
                was_correct: true,
                ..Default::default()
            }),
            false,
            seq,
        )
    }

    fn sequences(batch: &Batch) -> Vec<u64> {
        batch.records().iter().map(|r| r.sequence()).collect()
    }

    #[test]
    fn test_event_queue_new() {
        let queue = EventQueue::new(10);
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_none());
    }

    #[test]
    fn test_event_queue_append_and_drain_fifo() {
        let queue = EventQueue::new(10);
        for i in 0..3 {
            queue.append(record(i));
        }
        assert_eq!(queue.len(), 3);

        let batch = queue.drain_all().unwrap();
        assert_eq!(sequences(&batch), vec![0, 1, 2]);
        assert!(!batch.batch_id.is_empty());
        assert!(queue.is_empty());

        // Nothing can be drained twice
        assert!(queue.drain_all().is_none());
    }

    #[test]
    fn test_event_queue_prepend_preserves_order() {
        let queue = EventQueue::new(10);
        queue.append(record(0));
        queue.append(record(1));
        queue.append(record(2));
        let failed = queue.drain_all().unwrap();

        queue.append(record(3));
        queue.append(record(4));
        assert_eq!(queue.prepend_batch(failed), 0);

        let batch = queue.drain_all().unwrap();
        assert_eq!(sequences(&batch), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_event_queue_evicts_oldest_over_cap() {
        let queue = EventQueue::new(3);
        for i in 0..3 {
            assert_eq!(queue.append(record(i)).evicted, 0);
        }
        let appended = queue.append(record(3));
        assert_eq!(appended, Appended { len: 3, evicted: 1 });

        let batch = queue.drain_all().unwrap();
        assert_eq!(sequences(&batch), vec![1, 2, 3]);
    }

    #[test]
    fn test_event_queue_zero_cap_is_clamped() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.max_len(), 1);
    }

    #[test]
    fn test_event_queue_concurrent_append_and_drain() {
        let queue = Arc::new(EventQueue::new(10_000));
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.append(record(p * 1000 + i));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            if let Some(batch) = queue.drain_all() {
                drained.extend(sequences(&batch));
            }
        }
        for handle in producers {
            handle.join().unwrap();
        }
        if let Some(batch) = queue.drain_all() {
            drained.extend(sequences(&batch));
        }

        assert_eq!(drained.len(), 1000);
        let mut unique = drained.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 1000);
    }
}
