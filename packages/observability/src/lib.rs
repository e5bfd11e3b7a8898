//! # Observability
//!
//! Tracing subscriber setup shared by every attempt-outbox binary.
//!
//! Services call `observability::init_with_config()` once at startup and then use the
//! standard `tracing` macros. Each service writes structured JSONL to
//! `~/.attempt-outbox/logs/<service>.jsonl`:
//!
//! - `tail -f ~/.attempt-outbox/logs/attempt-replay.jsonl | jq` to follow a run
//! - `RUST_LOG=attempt_outbox=debug` to see individual enqueues and skipped flushes
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "attempt-replay".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file;

pub use file::{InitError, JsonlFileWriter};

use std::path::PathBuf;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service; selects the default log file name.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened, logging falls back to stderr only.
/// Calling this twice is a no-op for the second call.
pub fn init_with_config(config: LogConfig) {
    match file::init_file_subscriber(&config) {
        Ok(log_path) => {
            tracing::info!(
                service = %config.service_name,
                log_path = %log_path.display(),
                "observability initialized"
            );
        }
        Err(InitError::AlreadyInitialized) => {}
        Err(InitError::LogFile(e)) => {
            use tracing_subscriber::util::SubscriberInitExt;
            let fallback = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
                )
                .with_target(true)
                .compact()
                .with_writer(std::io::stderr)
                .finish()
                .try_init();
            if fallback.is_ok() {
                tracing::warn!(error = %e, "log file unavailable, logging to stderr only");
            }
        }
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
