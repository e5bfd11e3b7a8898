//! Producer-facing recording API used by game screens.

use crate::{
    Acknowledgement, AttemptPayload, FlushCoordinator, FlushOutcome, OutboxResult,
    SentenceAttempt, WordAttempt,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters for opening a game session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    pub game_type: String,
    /// `free_play` or `assignment`.
    pub session_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score_possible: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_data: Option<serde_json::Value>,
}

/// Final totals reported when a session closes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    pub game_type: String,
    pub session_mode: String,
    pub final_score: u32,
    pub accuracy_percentage: f64,
    pub completion_percentage: f64,
    pub words_attempted: u32,
    pub words_correct: u32,
    pub unique_words_practiced: u32,
    pub duration_seconds: u64,
    pub xp_earned: u32,
    #[serde(default)]
    pub bonus_xp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_data: Option<serde_json::Value>,
}

/// External collaborator that opens and closes sessions on the backend.
#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    /// Open a session and return its id.
    async fn start_session(&self, descriptor: &SessionDescriptor) -> OutboxResult<String>;

    /// Mark a session closed.
    async fn end_session(&self, session_id: &str, summary: &SessionSummary) -> OutboxResult<()>;
}

/// Entry point shared by every game screen.
///
/// Attempts go through the batching coordinator; session open/close is
/// passed straight to the [`SessionLifecycle`] collaborator.
#[derive(Clone)]
pub struct GameSessionRecorder {
    coordinator: Arc<FlushCoordinator>,
    sessions: Arc<dyn SessionLifecycle>,
}

impl GameSessionRecorder {
    pub fn new(coordinator: Arc<FlushCoordinator>, sessions: Arc<dyn SessionLifecycle>) -> Self {
        Self {
            coordinator,
            sessions,
        }
    }

    pub fn coordinator(&self) -> &Arc<FlushCoordinator> {
        &self.coordinator
    }

    /// Buffer a word answer. Returns a provisional reward for correct answers.
    pub fn record_word_attempt(
        &self,
        session_id: &str,
        game_type: &str,
        attempt: WordAttempt,
        skip_spaced_repetition: bool,
    ) -> Option<Acknowledgement> {
        if session_id.is_empty() {
            warn!(game_type, "Word attempt without a session id, not recorded");
            return None;
        }
        self.coordinator.enqueue(
            session_id,
            game_type,
            AttemptPayload::Word(attempt),
            skip_spaced_repetition,
        )
    }

    /// Buffer a sentence answer. Returns a provisional reward for correct answers.
    pub fn record_sentence_attempt(
        &self,
        session_id: &str,
        game_type: &str,
        attempt: SentenceAttempt,
    ) -> Option<Acknowledgement> {
        if session_id.is_empty() {
            warn!(game_type, "Sentence attempt without a session id, not recorded");
            return None;
        }
        let skip = attempt.skip_spaced_repetition;
        self.coordinator
            .enqueue(session_id, game_type, AttemptPayload::Sentence(attempt), skip)
    }

    pub async fn start_game_session(&self, descriptor: &SessionDescriptor) -> OutboxResult<String> {
        let session_id = self.sessions.start_session(descriptor).await?;
        info!(session_id = %session_id, game_type = %descriptor.game_type, "Game session started");
        Ok(session_id)
    }

    /// Flush buffered attempts, then close the session.
    ///
    /// The flush ignores the minimum interval so the session's records are
    /// attempted before it is marked closed. A failed flush leaves them
    /// queued for the next trigger and does not block closing.
    pub async fn end_game_session(
        &self,
        session_id: &str,
        summary: &SessionSummary,
    ) -> OutboxResult<FlushOutcome> {
        let outcome = self.coordinator.flush_now().await;
        if !outcome.is_success() {
            warn!(session_id, ?outcome, "Flush before session end did not complete");
        }

        self.sessions.end_session(session_id, summary).await?;
        info!(session_id, ?outcome, "Game session ended");
        Ok(outcome)
    }
}
