//! Shared helpers for attempt-outbox integration tests.
//!
//! Provides:
//! - ScriptedTransport: in-memory BatchTransport with queued failures and an
//!   optional hold that keeps a submission in flight
//! - MockBackend: minimal HTTP server speaking the batch endpoint contract

#![allow(dead_code)]

use async_trait::async_trait;
use attempt_outbox::{
    AttemptPayload, Batch, BatchTransport, FlushCoordinator, OutboxConfig, OutboxError,
    OutboxResult, SendReport, WordAttempt,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// Word text of every record in a batch, in order.
pub fn words(batch: &Batch) -> Vec<String> {
    batch
        .records()
        .iter()
        .map(|record| match record.payload() {
            AttemptPayload::Word(word) => word.word_text.clone(),
            AttemptPayload::Sentence(sentence) => sentence.source_text.clone(),
        })
        .collect()
}

pub fn word(text: &str, correct: bool) -> AttemptPayload {
    AttemptPayload::Word(WordAttempt {
        word_text: text.to_string(),
        translation_text: format!("{}-en", text),
        was_correct: correct,
        response_time_ms: 1200,
        ..Default::default()
    })
}

/// In-memory transport that records every batch it is given.
pub struct ScriptedTransport {
    async_batches: Mutex<Vec<Vec<String>>>,
    best_effort_batches: Mutex<Vec<Vec<String>>>,
    failures: Mutex<VecDeque<bool>>,
    refuse_best_effort: AtomicBool,
    hold: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            async_batches: Mutex::new(Vec::new()),
            best_effort_batches: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            refuse_best_effort: AtomicBool::new(false),
            hold: None,
        })
    }

    /// A transport whose submissions wait until `release` is called.
    pub fn held() -> Arc<Self> {
        Arc::new(Self {
            async_batches: Mutex::new(Vec::new()),
            best_effort_batches: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            refuse_best_effort: AtomicBool::new(false),
            hold: Some(Arc::new(Semaphore::new(0))),
        })
    }

    /// Let one held submission complete.
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.add_permits(1);
        }
    }

    /// Make the next `count` asynchronous submissions fail.
    pub fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..count {
            failures.push_back(true);
        }
    }

    pub fn refuse_best_effort(&self) {
        self.refuse_best_effort.store(true, Ordering::SeqCst);
    }

    pub fn async_batches(&self) -> Vec<Vec<String>> {
        self.async_batches.lock().unwrap().clone()
    }

    pub fn async_call_count(&self) -> usize {
        self.async_batches.lock().unwrap().len()
    }

    pub fn best_effort_batches(&self) -> Vec<Vec<String>> {
        self.best_effort_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn send_async(&self, batch: &Batch) -> OutboxResult<SendReport> {
        self.async_batches.lock().unwrap().push(words(batch));

        if let Some(hold) = &self.hold {
            hold.acquire().await.expect("hold closed").forget();
        }

        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(OutboxError::Send {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(SendReport {
            successful: batch.len(),
            duration_ms: 5,
        })
    }

    fn send_best_effort(&self, batch: &Batch) -> bool {
        self.best_effort_batches.lock().unwrap().push(words(batch));
        !self.refuse_best_effort.load(Ordering::SeqCst)
    }
}

pub fn coordinator(transport: Arc<ScriptedTransport>) -> FlushCoordinator {
    coordinator_with(OutboxConfig::default(), transport)
}

pub fn coordinator_with(config: OutboxConfig, transport: Arc<ScriptedTransport>) -> FlushCoordinator {
    FlushCoordinator::new(config, transport, tokio::runtime::Handle::current())
}

/// Let spawned flush tasks run to completion under a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Response the mock backend sends for one request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn accepted(count: usize) -> Self {
        Self {
            status: 200,
            body: format!(r#"{{"successful":{},"durationMs":7}}"#, count),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// A request captured by the mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Minimal HTTP/1.1 server for the batch endpoint.
pub struct MockBackend {
    pub url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(VecDeque::new()));

        let task_requests = requests.clone();
        let task_responses = responses.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let requests = task_requests.clone();
                let responses = task_responses.clone();
                tokio::spawn(async move {
                    handle_connection(stream, requests, responses).await;
                });
            }
        });

        Self {
            url: format!("http://{}/api/games/batch-record", addr),
            requests,
            responses,
        }
    }

    pub fn respond_with(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Poll until `count` requests arrived or the timeout passes.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) -> Vec<CapturedRequest> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let requests = self.requests();
            if requests.len() >= count || tokio::time::Instant::now() >= deadline {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            if name == "content-length" {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name == "authorization" {
                authorization = Some(value.trim().to_string());
            }
        }
    }

    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let body = serde_json::from_slice(&buf[header_end..header_end + content_length])
        .unwrap_or(serde_json::Value::Null);
    let answers = body["answers"].as_array().map(|a| a.len()).unwrap_or(0);
    requests.lock().unwrap().push(CapturedRequest {
        path,
        authorization,
        body,
    });

    let response = responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| MockResponse::accepted(answers));

    let reply = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}
