//! Session collaborator that only logs.

use async_trait::async_trait;
use attempt_outbox::{OutboxResult, SessionDescriptor, SessionLifecycle, SessionSummary};
use tracing::info;
use uuid::Uuid;

/// Opens sessions locally and logs their lifecycle.
///
/// The replay tool has no session backend; attempts still go to the
/// configured batch endpoint.
pub struct LoggingSessionLifecycle;

#[async_trait]
impl SessionLifecycle for LoggingSessionLifecycle {
    async fn start_session(&self, descriptor: &SessionDescriptor) -> OutboxResult<String> {
        let session_id = Uuid::new_v4().to_string();
        info!(
            session_id = %session_id,
            student_id = %descriptor.student_id,
            game_type = %descriptor.game_type,
            session_mode = %descriptor.session_mode,
            "Session opened"
        );
        Ok(session_id)
    }

    async fn end_session(&self, session_id: &str, summary: &SessionSummary) -> OutboxResult<()> {
        info!(
            session_id,
            words_attempted = summary.words_attempted,
            words_correct = summary.words_correct,
            accuracy = summary.accuracy_percentage,
            xp_earned = summary.xp_earned,
            duration_seconds = summary.duration_seconds,
            "Session closed"
        );
        Ok(())
    }
}
