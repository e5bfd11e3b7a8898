//! Logging initialization for the tooling binaries.
//!
//! Wraps the observability crate: structured JSONL goes to
//! `<base>/logs/<service>.jsonl` and a compact copy to stderr.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for `service_name` under `paths`.
///
/// `level` is the default filter; `RUST_LOG` takes precedence when set.
///
/// ```ignore
/// init_logging(&paths, "attempt-replay", "info");
/// tracing::info!("Replay started");
/// ```
pub fn init_logging(paths: &Paths, service_name: &str, level: &str) {
    observability::init_with_config(log_config(paths, service_name, level));
}

fn log_config(paths: &Paths, service_name: &str, level: &str) -> LogConfig {
    LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: Some(paths.log_file(service_name)),
        also_stderr: true,
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
