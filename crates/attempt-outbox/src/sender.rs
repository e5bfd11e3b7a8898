//! Batch transmission over HTTP.
//!
//! Two delivery modes share one endpoint and one payload shape:
//! - `send_async`: awaited submission used while the app is running.
//! - `send_best_effort`: fire-and-forget hand-off used at shutdown. The body
//!   is serialized on the caller's thread and queued on a dedicated beacon
//!   thread, so the caller never suspends.

use crate::{AttemptKind, AttemptPayload, Batch, OutboxError, OutboxResult};
use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default submission endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/games/batch-record";

/// Payload ceiling for best-effort delivery.
pub const DEFAULT_BEACON_MAX_BYTES: usize = 64 * 1024;

/// Requests the beacon thread holds before refusing new ones.
pub const BEACON_QUEUE_CAPACITY: usize = 64;

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Full URL of the batch endpoint.
    pub endpoint_url: String,
    /// Request timeout for both delivery modes.
    pub request_timeout: Duration,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// Largest body the best-effort path accepts.
    pub beacon_max_bytes: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            auth_token: None,
            beacon_max_bytes: DEFAULT_BEACON_MAX_BYTES,
        }
    }
}

/// One answer in the request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    #[serde(rename = "type")]
    pub kind: AttemptKind,
    pub record_id: Uuid,
    pub session_id: String,
    pub game_type: String,
    pub attempt: AttemptPayload,
    pub skip_spaced_repetition: bool,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Request body for one flush.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchRequest {
    pub answers: Vec<SubmitAnswer>,
    pub timestamp: i64,
}

impl SubmitBatchRequest {
    pub fn from_batch(batch: &Batch) -> Self {
        Self {
            answers: batch
                .records()
                .iter()
                .map(|record| SubmitAnswer {
                    kind: record.kind(),
                    record_id: record.record_id(),
                    session_id: record.session_id().to_string(),
                    game_type: record.game_type().to_string(),
                    attempt: record.payload().clone(),
                    skip_spaced_repetition: record.skip_downstream_scheduling(),
                    timestamp: record.enqueued_at().timestamp_millis(),
                })
                .collect(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Response from the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchResponse {
    pub successful: usize,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Result of an acknowledged submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Records the backend stored.
    pub successful: usize,
    /// Server-side processing time.
    pub duration_ms: u64,
}

/// Network submission of a batch.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Submit the batch as one request and wait for the backend's answer.
    ///
    /// Anything short of the whole batch being accepted is an error.
    async fn send_async(&self, batch: &Batch) -> OutboxResult<SendReport>;

    /// Hand the batch to a delivery primitive that does not need the caller
    /// to stay alive. Returns whether it was accepted for sending, not
    /// whether the backend processed it. Must not block on the network.
    fn send_best_effort(&self, batch: &Batch) -> bool;
}

/// HTTP implementation of [`BatchTransport`].
pub struct HttpTransmissionClient {
    config: SenderConfig,
    client: Client,
    beacon: BeaconDispatcher,
}

impl HttpTransmissionClient {
    /// Create a new transmission client and its beacon thread.
    pub fn new(config: SenderConfig) -> OutboxResult<Self> {
        if config.endpoint_url.trim().is_empty() {
            return Err(OutboxError::Config("endpoint_url is empty".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;
        let beacon = BeaconDispatcher::spawn(config.request_timeout, BEACON_QUEUE_CAPACITY)?;

        Ok(Self {
            config,
            client,
            beacon,
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.config.endpoint_url
    }

    /// Beacon thread used by the best-effort path.
    pub fn beacon(&self) -> &BeaconDispatcher {
        &self.beacon
    }
}

#[async_trait]
impl BatchTransport for HttpTransmissionClient {
    async fn send_async(&self, batch: &Batch) -> OutboxResult<SendReport> {
        let request = SubmitBatchRequest::from_batch(batch);

        debug!(
            url = %self.config.endpoint_url,
            batch_id = %batch.batch_id,
            answers = request.answers.len(),
            "Sending batch"
        );

        let mut builder = self
            .client
            .post(&self.config.endpoint_url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = &self.config.auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboxError::Send {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let result: SubmitBatchResponse = serde_json::from_str(&body)?;

        if result.successful < batch.len() {
            return Err(OutboxError::PartialAcceptance {
                accepted: result.successful,
                expected: batch.len(),
            });
        }

        Ok(SendReport {
            successful: result.successful,
            duration_ms: result.duration_ms,
        })
    }

    fn send_best_effort(&self, batch: &Batch) -> bool {
        let body = match serde_json::to_vec(&SubmitBatchRequest::from_batch(batch)) {
            Ok(body) => body,
            Err(e) => {
                error!(batch_id = %batch.batch_id, error = %e, "Failed to encode beacon body");
                return false;
            }
        };

        if body.len() > self.config.beacon_max_bytes {
            warn!(
                batch_id = %batch.batch_id,
                bytes = body.len(),
                limit = self.config.beacon_max_bytes,
                "Beacon body over size limit"
            );
            return false;
        }

        self.beacon.dispatch(BeaconRequest {
            url: self.config.endpoint_url.clone(),
            auth_token: self.config.auth_token.clone(),
            body,
        })
    }
}

/// A serialized request waiting on the beacon thread.
#[derive(Debug)]
pub struct BeaconRequest {
    pub url: String,
    pub auth_token: Option<String>,
    pub body: Vec<u8>,
}

/// Dedicated OS thread that posts beacon bodies with a blocking client.
///
/// Accepting a request only means it reached the thread's channel. The
/// channel is bounded; a full channel refuses the request.
pub struct BeaconDispatcher {
    sender: SyncSender<BeaconRequest>,
    outstanding: Arc<(Mutex<usize>, Condvar)>,
}

impl BeaconDispatcher {
    /// Start the beacon thread.
    pub fn spawn(timeout: Duration, capacity: usize) -> OutboxResult<Self> {
        let (sender, receiver) = sync_channel::<BeaconRequest>(capacity);
        let outstanding = Arc::new((Mutex::new(0usize), Condvar::new()));
        let worker_outstanding = outstanding.clone();

        std::thread::Builder::new()
            .name("attempt-beacon".to_string())
            .spawn(move || run_beacon_thread(receiver, worker_outstanding, timeout))?;

        Ok(Self {
            sender,
            outstanding,
        })
    }

    /// Queue a request. Never blocks.
    pub fn dispatch(&self, request: BeaconRequest) -> bool {
        let (count, _) = &*self.outstanding;
        *count.lock() += 1;

        match self.sender.try_send(request) {
            Ok(()) => true,
            Err(e) => {
                let (count, signal) = &*self.outstanding;
                let mut count = count.lock();
                *count -= 1;
                signal.notify_all();
                match e {
                    TrySendError::Full(_) => warn!("Beacon queue full, request not accepted"),
                    TrySendError::Disconnected(_) => {
                        warn!("Beacon thread is gone, request not accepted")
                    }
                }
                false
            }
        }
    }

    /// Requests accepted but not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.0.lock()
    }

    /// Wait up to `timeout` for accepted requests to finish.
    ///
    /// Returns true if nothing is outstanding when it returns.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (count, signal) = &*self.outstanding;
        let mut count = count.lock();
        while *count > 0 {
            if signal.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        *count == 0
    }
}

fn run_beacon_thread(
    receiver: Receiver<BeaconRequest>,
    outstanding: Arc<(Mutex<usize>, Condvar)>,
    timeout: Duration,
) {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build();

    while let Ok(request) = receiver.recv() {
        match &client {
            Ok(client) => post_beacon(client, request),
            Err(e) => error!(error = %e, "Beacon client unavailable, dropping request"),
        }

        let (count, signal) = &*outstanding;
        let mut count = count.lock();
        *count = count.saturating_sub(1);
        signal.notify_all();
    }

    debug!("Beacon thread stopped (channel closed)");
}

fn post_beacon(client: &reqwest::blocking::Client, request: BeaconRequest) {
    let bytes = request.body.len();
    let mut builder = client
        .post(&request.url)
        .header("Content-Type", "application/json")
        .body(request.body);
    if let Some(token) = &request.auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    match builder.send() {
        Ok(response) if response.status().is_success() => {
            info!(bytes, "Beacon delivered");
        }
        Ok(response) => {
            warn!(status = %response.status(), bytes, "Beacon rejected by backend");
        }
        Err(e) => {
            warn!(error = %e, bytes, "Beacon delivery failed");
        }
    }
}
