//! Flush coordinator owning the event queue and its triggers.

use crate::triggers::PeriodicTrigger;
use crate::{
    Acknowledgement, AttemptPayload, AttemptRecord, Batch, BatchTransport, BufferStats,
    EventQueue, LifecycleEvent, StatsTracker,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shortest period the background flush timer runs at.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Queue length that fires the size trigger.
    pub max_buffer_size: usize,
    /// Minimum spacing between rate-limited flushes.
    pub min_flush_interval: Duration,
    /// Period of the background flush timer.
    pub flush_interval: Duration,
    /// Hard cap on buffered records.
    pub max_queue_len: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 5,
            min_flush_interval: Duration::from_secs(1),
            flush_interval: Duration::from_secs(30),
            max_queue_len: crate::queue::DEFAULT_MAX_QUEUE_LEN,
        }
    }
}

/// What a flush call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued; no network call was made.
    Empty,
    /// Skipped because the previous flush started less than the minimum interval ago.
    RateLimited,
    /// Skipped because another submission is still in flight.
    Busy,
    /// The backend acknowledged every record.
    Delivered { records: usize, duration_ms: u64 },
    /// Submission failed; the batch is back at the head of the queue.
    Requeued { records: usize },
    /// Best-effort hand-off accepted by the transport.
    Dispatched { records: usize },
    /// Best-effort hand-off refused; the records are gone.
    Lost { records: usize },
}

impl FlushOutcome {
    /// True when nothing is left to retry for this call.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FlushOutcome::Empty | FlushOutcome::Delivered { .. } | FlushOutcome::Dispatched { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    RateLimited,
    Forced,
}

/// State shared with spawned flush tasks and the periodic timer.
struct Shared {
    config: OutboxConfig,
    queue: EventQueue,
    stats: StatsTracker,
    transport: Arc<dyn BatchTransport>,
    /// Held for the whole submission, so at most one batch is in flight.
    send_gate: Arc<tokio::sync::Mutex<()>>,
    last_flush_started: Mutex<Option<Instant>>,
    next_sequence: AtomicU64,
}

impl Shared {
    fn within_min_interval(&self) -> bool {
        match *self.last_flush_started.lock() {
            Some(started) => started.elapsed() < self.config.min_flush_interval,
            None => false,
        }
    }

    /// Claim the send gate and drain without suspending.
    fn begin_rate_limited(&self) -> Result<(OwnedMutexGuard<()>, Batch), FlushOutcome> {
        if self.queue.is_empty() {
            return Err(FlushOutcome::Empty);
        }
        let guard = self
            .send_gate
            .clone()
            .try_lock_owned()
            .map_err(|_| FlushOutcome::Busy)?;
        if self.within_min_interval() {
            return Err(FlushOutcome::RateLimited);
        }
        let batch = self.queue.drain_all().ok_or(FlushOutcome::Empty)?;
        *self.last_flush_started.lock() = Some(Instant::now());
        Ok((guard, batch))
    }

    async fn flush(&self, mode: FlushMode) -> FlushOutcome {
        let (guard, batch) = match mode {
            FlushMode::RateLimited => match self.begin_rate_limited() {
                Ok(claimed) => claimed,
                Err(outcome) => {
                    debug!(?outcome, "Flush skipped");
                    return outcome;
                }
            },
            FlushMode::Forced => {
                if self.queue.is_empty() {
                    return FlushOutcome::Empty;
                }
                let guard = self.send_gate.clone().lock_owned().await;
                let Some(batch) = self.queue.drain_all() else {
                    return FlushOutcome::Empty;
                };
                *self.last_flush_started.lock() = Some(Instant::now());
                (guard, batch)
            }
        };

        self.submit(batch, guard).await
    }

    async fn submit(&self, batch: Batch, _gate: OwnedMutexGuard<()>) -> FlushOutcome {
        let records = batch.len();

        match self.transport.send_async(&batch).await {
            Ok(report) => {
                self.stats.record_flush_success(records);
                info!(
                    batch_id = %batch.batch_id,
                    records,
                    duration_ms = report.duration_ms,
                    "Batch acknowledged"
                );
                FlushOutcome::Delivered {
                    records,
                    duration_ms: report.duration_ms,
                }
            }
            Err(e) => {
                let batch_id = batch.batch_id.clone();
                let evicted = self.queue.prepend_batch(batch);
                self.stats.record_dropped(evicted);
                self.stats.record_flush_failure(&e.to_string());
                warn!(
                    batch_id = %batch_id,
                    records,
                    error = %e,
                    "Batch send failed, returned for retry"
                );
                FlushOutcome::Requeued { records }
            }
        }
    }

    fn flush_synchronous(&self) -> FlushOutcome {
        let Some(batch) = self.queue.drain_all() else {
            return FlushOutcome::Empty;
        };
        let records = batch.len();

        if self.transport.send_best_effort(&batch) {
            self.stats.record_flush_success(records);
            info!(batch_id = %batch.batch_id, records, "Batch handed to best-effort delivery");
            FlushOutcome::Dispatched { records }
        } else {
            self.stats.record_lost(records);
            error!(
                batch_id = %batch.batch_id,
                records,
                "Best-effort delivery refused, records lost"
            );
            FlushOutcome::Lost { records }
        }
    }
}

/// Owns the event queue and serializes every flush against it.
///
/// One instance is created per app lifetime and shared by reference (wrap
/// it in an `Arc`). Producers only see `enqueue` and the flush entry
/// points; the queue and counters stay private.
///
/// # Lifecycle
///
/// 1. Create with [`FlushCoordinator::new()`]; the periodic timer starts
///    immediately and the lifecycle trigger is attached.
/// 2. Producers call [`FlushCoordinator::enqueue()`].
/// 3. The host forwards visibility changes to
///    [`FlushCoordinator::handle_lifecycle()`].
/// 4. Call [`FlushCoordinator::destroy()`] at teardown.
pub struct FlushCoordinator {
    shared: Arc<Shared>,
    runtime: tokio::runtime::Handle,
    periodic: Mutex<Option<PeriodicTrigger>>,
    lifecycle_attached: AtomicBool,
    destroyed: AtomicBool,
}

impl FlushCoordinator {
    /// Create a coordinator and start its periodic trigger on `runtime`.
    pub fn new(
        config: OutboxConfig,
        transport: Arc<dyn BatchTransport>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: EventQueue::new(config.max_queue_len),
            stats: StatsTracker::new(),
            transport,
            send_gate: Arc::new(tokio::sync::Mutex::new(())),
            last_flush_started: Mutex::new(None),
            next_sequence: AtomicU64::new(0),
            config,
        });

        let mut timer_period = shared.config.flush_interval;
        if timer_period < MIN_TIMER_PERIOD {
            warn!(
                flush_interval_ms = timer_period.as_millis() as u64,
                "Flush interval below 1ms, clamping the periodic timer"
            );
            timer_period = MIN_TIMER_PERIOD;
        }

        let timer_shared = shared.clone();
        let periodic = PeriodicTrigger::spawn(&runtime, timer_period, move || {
            let shared = timer_shared.clone();
            async move {
                if shared.queue.is_empty() {
                    return;
                }
                debug!(queued = shared.queue.len(), "Periodic flush");
                shared.flush(FlushMode::RateLimited).await;
            }
        });

        info!(
            max_buffer_size = shared.config.max_buffer_size,
            flush_interval_ms = shared.config.flush_interval.as_millis() as u64,
            "Flush coordinator started"
        );

        Self {
            shared,
            runtime,
            periodic: Mutex::new(Some(periodic)),
            lifecycle_attached: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.shared.config
    }

    /// Buffer one attempt.
    ///
    /// Returns immediately with the optimistic acknowledgement. When the
    /// queue reaches `max_buffer_size` the batch is drained before this
    /// returns and submitted on a spawned task.
    pub fn enqueue(
        &self,
        session_id: &str,
        game_type: &str,
        payload: AttemptPayload,
        skip_downstream_scheduling: bool,
    ) -> Option<Acknowledgement> {
        let sequence = self.shared.next_sequence.fetch_add(1, Ordering::SeqCst);
        let record = AttemptRecord::new(
            session_id,
            game_type,
            payload,
            skip_downstream_scheduling,
            sequence,
        );
        let acknowledgement = record.provisional_award();

        let appended = self.shared.queue.append(record);
        self.shared.stats.record_enqueued(appended.evicted);
        debug!(session_id, game_type, sequence, queued = appended.len, "Enqueued attempt");

        if appended.len >= self.shared.config.max_buffer_size {
            match self.shared.begin_rate_limited() {
                Ok((gate, batch)) => {
                    debug!(records = batch.len(), "Size threshold reached, flushing");
                    let shared = self.shared.clone();
                    self.runtime.spawn(async move {
                        shared.submit(batch, gate).await;
                    });
                }
                Err(outcome) => {
                    debug!(?outcome, queued = appended.len, "Size-triggered flush deferred");
                }
            }
        }

        acknowledgement
    }

    /// Flush whatever is queued, subject to the minimum interval.
    ///
    /// Never returns an error: a failed submission is requeued and logged.
    pub async fn flush(&self) -> FlushOutcome {
        self.shared.flush(FlushMode::RateLimited).await
    }

    /// Flush ignoring the minimum interval, waiting for any in-flight batch first.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.shared.flush(FlushMode::Forced).await
    }

    /// Drain and hand everything to best-effort delivery without suspending.
    ///
    /// There is no retry on this path.
    pub fn flush_synchronous(&self) -> FlushOutcome {
        self.shared.flush_synchronous()
    }

    /// Lifecycle trigger entry point, called from the host's visibility hooks.
    pub fn handle_lifecycle(&self, event: LifecycleEvent) -> FlushOutcome {
        if !self.lifecycle_attached.load(Ordering::SeqCst) {
            debug!(?event, "Lifecycle trigger detached, ignoring");
            return FlushOutcome::Empty;
        }
        if !event.requires_flush() {
            return FlushOutcome::Empty;
        }
        info!(?event, queued = self.shared.queue.len(), "Lifecycle flush");
        self.flush_synchronous()
    }

    /// Read-only snapshot of the counters.
    pub fn get_stats(&self) -> BufferStats {
        self.shared.stats.snapshot(self.shared.queue.len())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Stop the timer, detach the lifecycle trigger and hand any remaining
    /// records to best-effort delivery.
    ///
    /// An in-flight asynchronous submission is not cancelled; its outcome is
    /// still applied to the queue.
    pub fn destroy(&self) -> FlushOutcome {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return FlushOutcome::Empty;
        }

        if let Some(periodic) = self.periodic.lock().take() {
            periodic.stop();
        }
        self.lifecycle_attached.store(false, Ordering::SeqCst);

        let outcome = if self.shared.queue.is_empty() {
            FlushOutcome::Empty
        } else {
            self.flush_synchronous()
        };

        info!(?outcome, "Flush coordinator destroyed");
        outcome
    }
}

impl Drop for FlushCoordinator {
    fn drop(&mut self) {
        if let Some(periodic) = self.periodic.get_mut().take() {
            periodic.stop();
        }
        if !self.is_destroyed() && !self.shared.queue.is_empty() {
            warn!(
                queued = self.shared.queue.len(),
                "Flush coordinator dropped without destroy()"
            );
        }
    }
}
