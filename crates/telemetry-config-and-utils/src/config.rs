//! Configuration for the attempt pipeline and its tooling.

use crate::{CoreError, CoreResult, Paths};
use attempt_outbox::{OutboxConfig, SenderConfig, DEFAULT_BEACON_MAX_BYTES, DEFAULT_ENDPOINT_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_LOG_LEVEL: &str = "ATTEMPT_OUTBOX_LOG_LEVEL";
const ENV_ENDPOINT: &str = "ATTEMPT_OUTBOX_ENDPOINT";
const ENV_AUTH_TOKEN: &str = "ATTEMPT_OUTBOX_AUTH_TOKEN";

/// On-disk configuration (`<base>/config.json`).
///
/// Every field is optional in the file; missing fields take the defaults
/// of the core pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Batch endpoint URL.
    pub endpoint_url: String,
    /// Bearer token sent with every submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Queue length that triggers a flush.
    pub max_buffer_size: usize,
    /// Minimum spacing between rate-limited flushes, in milliseconds.
    pub min_flush_interval_ms: u64,
    /// Background timer period, in milliseconds.
    pub flush_interval_ms: u64,
    /// Hard cap on buffered records.
    pub max_queue_len: usize,
    /// HTTP request timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Largest body accepted by best-effort delivery.
    pub beacon_max_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let outbox = OutboxConfig::default();
        let sender = SenderConfig::default();
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            auth_token: None,
            max_buffer_size: outbox.max_buffer_size,
            min_flush_interval_ms: outbox.min_flush_interval.as_millis() as u64,
            flush_interval_ms: outbox.flush_interval.as_millis() as u64,
            max_queue_len: outbox.max_queue_len,
            request_timeout_ms: sender.request_timeout.as_millis() as u64,
            beacon_max_bytes: DEFAULT_BEACON_MAX_BYTES,
        }
    }
}

impl Config {
    /// Load `<base>/config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `<base>/config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint_url = endpoint;
        }
        if let Some(token) = non_empty(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_buffer_size == 0 {
            return Err(CoreError::Config("max_buffer_size must be at least 1".to_string()));
        }
        if self.flush_interval_ms == 0 {
            return Err(CoreError::Config("flush_interval_ms must be positive".to_string()));
        }
        if self.max_queue_len < self.max_buffer_size {
            return Err(CoreError::Config(format!(
                "max_queue_len ({}) is smaller than max_buffer_size ({})",
                self.max_queue_len, self.max_buffer_size
            )));
        }
        self.endpoint_url()?;
        Ok(())
    }

    /// The endpoint as a parsed URL. Only http and https are accepted.
    pub fn endpoint_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.endpoint_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::Config(format!(
                "endpoint_url must be http or https, got {}",
                other
            ))),
        }
    }

    /// Coordinator settings.
    pub fn outbox_config(&self) -> OutboxConfig {
        OutboxConfig {
            max_buffer_size: self.max_buffer_size,
            min_flush_interval: Duration::from_millis(self.min_flush_interval_ms),
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            max_queue_len: self.max_queue_len,
        }
    }

    /// Transmission client settings.
    pub fn sender_config(&self) -> CoreResult<SenderConfig> {
        Ok(SenderConfig {
            endpoint_url: self.endpoint_url()?.to_string(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            auth_token: self.auth_token.clone(),
            beacon_max_bytes: self.beacon_max_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_matches_pipeline_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.max_buffer_size, 5);
        assert_eq!(config.min_flush_interval_ms, 1_000);
        assert_eq!(config.flush_interval_ms, 30_000);
        assert_eq!(config.max_queue_len, 500);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert!(config.auth_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_partial_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "max_buffer_size": 10
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_buffer_size, 10);
        assert_eq!(config.flush_interval_ms, 30_000);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            flush_interval_ms: 5_000,
            ..Default::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.max_buffer_size, 5);
    }

    #[test]
    fn test_config_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{"max_buffer_size": 0}"#).unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_LOG_LEVEL, "warn"),
            (ENV_ENDPOINT, "https://api.example.com/api/games/batch-record"),
            (ENV_AUTH_TOKEN, "tok"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.endpoint_url, "https://api.example.com/api/games/batch-record");
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_endpoint_url_validation() {
        let mut config = Config::default();
        config.endpoint_url = "not a valid url".to_string();
        assert!(matches!(config.endpoint_url(), Err(CoreError::InvalidUrl(_))));

        config.endpoint_url = "ftp://example.com/batch".to_string();
        assert!(matches!(config.endpoint_url(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_conversion_to_core_configs() {
        let config = Config {
            max_buffer_size: 8,
            min_flush_interval_ms: 250,
            auth_token: Some("tok".to_string()),
            ..Default::default()
        };

        let outbox = config.outbox_config();
        assert_eq!(outbox.max_buffer_size, 8);
        assert_eq!(outbox.min_flush_interval, Duration::from_millis(250));
        assert_eq!(outbox.flush_interval, Duration::from_secs(30));

        let sender = config.sender_config().unwrap();
        assert_eq!(sender.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(sender.request_timeout, Duration::from_secs(10));
        assert_eq!(sender.auth_token.as_deref(), Some("tok"));
    }
}
