//! Batched delivery of gameplay answer attempts.
//!
//! This crate provides:
//! - EventQueue: ordered, bounded, lock-protected buffer of pending attempts
//! - FlushCoordinator: size, periodic and lifecycle flush triggers with
//!   retry-by-requeue and a minimum-interval rate limiter
//! - HttpTransmissionClient: single-request batch submission plus a
//!   best-effort beacon mode for shutdown
//! - StatsTracker: monotonic counters for observability and tests
//! - GameSessionRecorder: the producer-facing API used by game screens

mod attempt;
mod coordinator;
mod error;
mod queue;
mod recorder;
mod sender;
mod stats;
mod triggers;

pub use attempt::{
    Acknowledgement, AttemptKind, AttemptPayload, AttemptRecord, GemAward, GemRarity,
    SentenceAttempt, WordAttempt,
};
pub use coordinator::{FlushCoordinator, FlushOutcome, OutboxConfig};
pub use error::{OutboxError, OutboxResult};
pub use queue::{Appended, Batch, EventQueue, DEFAULT_MAX_QUEUE_LEN};
pub use recorder::{GameSessionRecorder, SessionDescriptor, SessionLifecycle, SessionSummary};
pub use sender::{
    BatchTransport, BeaconDispatcher, BeaconRequest, HttpTransmissionClient, SendReport,
    SenderConfig, SubmitAnswer, SubmitBatchRequest, SubmitBatchResponse,
    BEACON_QUEUE_CAPACITY, DEFAULT_BEACON_MAX_BYTES, DEFAULT_ENDPOINT_URL,
};
pub use stats::{BufferStats, StatsTracker};
pub use triggers::LifecycleEvent;
