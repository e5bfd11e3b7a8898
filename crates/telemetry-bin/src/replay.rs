//! The `replay` command.
//!
//! Input is one JSON object per line:
//!
//! ```text
//! {"type":"word","attempt":{"wordText":"gato","translationText":"cat","wasCorrect":true}}
//! {"type":"sentence","attempt":{"sourceText":"el gato","targetText":"the cat","wasCorrect":false}}
//! ```

use crate::session::LoggingSessionLifecycle;
use attempt_outbox::{
    BufferStats, FlushCoordinator, GameSessionRecorder, HttpTransmissionClient,
    LifecycleEvent, SentenceAttempt, SessionDescriptor, SessionSummary, WordAttempt,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetry_config_and_utils::Config;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of attempts. Reads stdin when omitted
    pub input: Option<PathBuf>,

    /// Student the session is opened for
    #[arg(long, default_value = "replay-student")]
    pub student_id: String,

    /// Game type recorded on every attempt
    #[arg(long, default_value = "hangman")]
    pub game_type: String,

    /// Assignment the session belongs to (free play when omitted)
    #[arg(long)]
    pub assignment_id: Option<String>,

    /// Print buffer stats every N attempts (0 disables)
    #[arg(long, default_value_t = 0)]
    pub stats_every: usize,

    /// Seconds to wait for best-effort deliveries before exiting
    #[arg(long, default_value_t = 5)]
    pub drain_secs: u64,
}

/// One input line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ReplayLine {
    Word {
        attempt: WordAttempt,
        #[serde(default, rename = "skipSpacedRepetition")]
        skip_spaced_repetition: bool,
    },
    Sentence {
        attempt: SentenceAttempt,
    },
}

/// How the input loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayEnd {
    Eof,
    Interrupted,
}

/// Running totals for the session summary.
#[derive(Debug, Default)]
struct SessionTally {
    attempted: u32,
    correct: u32,
    xp: u32,
    skipped_lines: u32,
    unique_words: HashSet<String>,
}

impl SessionTally {
    fn summary(&self, args: &ReplayArgs, session_mode: &str, elapsed: Duration) -> SessionSummary {
        let accuracy = if self.attempted == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempted) * 100.0
        };
        SessionSummary {
            student_id: args.student_id.clone(),
            assignment_id: args.assignment_id.clone(),
            game_type: args.game_type.clone(),
            session_mode: session_mode.to_string(),
            final_score: self.xp,
            accuracy_percentage: accuracy,
            completion_percentage: 100.0,
            words_attempted: self.attempted,
            words_correct: self.correct,
            unique_words_practiced: self.unique_words.len() as u32,
            duration_seconds: elapsed.as_secs(),
            xp_earned: self.xp,
            ..Default::default()
        }
    }
}

/// Printed when the command finishes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub session_id: String,
    pub attempts: u32,
    pub skipped_lines: u32,
    pub interrupted: bool,
    pub end_session_flush: Option<String>,
    pub shutdown_flush: String,
    pub beacon_drained: bool,
    pub stats: BufferStats,
}

pub async fn run_replay(
    config: &Config,
    args: ReplayArgs,
) -> Result<ReplaySummary, Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransmissionClient::new(config.sender_config()?)?);
    let coordinator = Arc::new(FlushCoordinator::new(
        config.outbox_config(),
        transport.clone(),
        tokio::runtime::Handle::current(),
    ));
    let recorder = GameSessionRecorder::new(coordinator.clone(), Arc::new(LoggingSessionLifecycle));

    let session_mode = if args.assignment_id.is_some() {
        "assignment"
    } else {
        "free_play"
    };
    let session_id = recorder
        .start_game_session(&SessionDescriptor {
            student_id: args.student_id.clone(),
            assignment_id: args.assignment_id.clone(),
            game_type: args.game_type.clone(),
            session_mode: session_mode.to_string(),
            ..Default::default()
        })
        .await?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let started = Instant::now();
    let mut tally = SessionTally::default();
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let end = replay_lines(
        &recorder,
        &session_id,
        &args.game_type,
        reader,
        args.stats_every,
        &mut tally,
        interrupt,
    )
    .await?;

    let end_session_flush = match end {
        ReplayEnd::Eof => {
            let summary = tally.summary(&args, session_mode, started.elapsed());
            let outcome = recorder.end_game_session(&session_id, &summary).await?;
            Some(format!("{:?}", outcome))
        }
        ReplayEnd::Interrupted => {
            let outcome = coordinator.handle_lifecycle(LifecycleEvent::Terminating);
            info!(?outcome, "Interrupted, buffered attempts handed to best-effort delivery");
            None
        }
    };

    let shutdown = coordinator.destroy();

    let drain_for = Duration::from_secs(args.drain_secs);
    let beacon_transport = transport.clone();
    let beacon_drained =
        tokio::task::spawn_blocking(move || beacon_transport.beacon().drain(drain_for)).await?;
    if !beacon_drained {
        warn!(
            outstanding = transport.beacon().outstanding(),
            "Best-effort deliveries still pending at exit"
        );
    }

    Ok(ReplaySummary {
        session_id,
        attempts: tally.attempted,
        skipped_lines: tally.skipped_lines,
        interrupted: end == ReplayEnd::Interrupted,
        end_session_flush,
        shutdown_flush: format!("{:?}", shutdown),
        beacon_drained,
        stats: coordinator.get_stats(),
    })
}

/// Record every line until EOF or `interrupt` resolves.
async fn replay_lines<R, F>(
    recorder: &GameSessionRecorder,
    session_id: &str,
    game_type: &str,
    reader: R,
    stats_every: usize,
    tally: &mut SessionTally,
    interrupt: F,
) -> std::io::Result<ReplayEnd>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = reader.lines();
    tokio::pin!(interrupt);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut interrupt => return Ok(ReplayEnd::Interrupted),
        };
        let Some(line) = line else {
            return Ok(ReplayEnd::Eof);
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed: ReplayLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tally.skipped_lines += 1;
                warn!(error = %e, "Skipping malformed attempt line");
                continue;
            }
        };

        let (ack, correct, text) = match parsed {
            ReplayLine::Word {
                attempt,
                skip_spaced_repetition,
            } => {
                let correct = attempt.was_correct;
                let text = attempt.word_text.clone();
                let ack = recorder.record_word_attempt(
                    session_id,
                    game_type,
                    attempt,
                    skip_spaced_repetition,
                );
                (ack, correct, text)
            }
            ReplayLine::Sentence { attempt } => {
                let correct = attempt.was_correct;
                let text = attempt.source_text.clone();
                let ack = recorder.record_sentence_attempt(session_id, game_type, attempt);
                (ack, correct, text)
            }
        };

        tally.attempted += 1;
        if correct {
            tally.correct += 1;
        }
        if let Some(ack) = ack {
            tally.xp += ack.award().xp_value;
        }
        tally.unique_words.insert(text);

        if stats_every > 0 && tally.attempted as usize % stats_every == 0 {
            let stats = recorder.coordinator().get_stats();
            match serde_json::to_string(&stats) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!(error = %e, "Failed to encode stats"),
            }
        }
    }
}
