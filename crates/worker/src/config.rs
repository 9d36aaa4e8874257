//! Worker configuration loaded from environment variables.

use std::time::Duration;

/// How to log: human-readable text or one JSON object per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Which provider backend the registry is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Real AWS IAM using per-request tenant credentials.
    Aws,
    /// In-memory provider, for local runs without a cloud account.
    Memory,
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `SOURCES_API_URL`: system-of-record base URL (default `http://localhost:8000`)
/// - `SOURCES_API_TIMEOUT_SECS`: request timeout (default `30`)
/// - `AWS_REGION`: region for IAM clients (default `us-east-1`)
/// - `WORKER_CONCURRENCY`: events handled at once (default `8`)
/// - `QUEUE_CAPACITY`: bounded ingest queue size (default `256`)
/// - `PROVIDER_MODE`: `aws` or `memory` (default `aws`)
///
/// Unparseable values fall back to their default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub sources_api_url: String,
    pub sources_api_timeout: Duration,
    pub aws_region: String,
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub provider_mode: ProviderMode,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => defaults.log_format,
            },
            sources_api_url: lookup("SOURCES_API_URL").unwrap_or(defaults.sources_api_url),
            sources_api_timeout: parsed("SOURCES_API_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sources_api_timeout),
            aws_region: lookup("AWS_REGION").unwrap_or(defaults.aws_region),
            concurrency: parsed("WORKER_CONCURRENCY")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.concurrency),
            queue_capacity: parsed("QUEUE_CAPACITY")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.queue_capacity),
            provider_mode: match lookup("PROVIDER_MODE").as_deref() {
                Some("memory") => ProviderMode::Memory,
                _ => defaults.provider_mode,
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            sources_api_url: "http://localhost:8000".to_string(),
            sources_api_timeout: Duration::from_secs(30),
            aws_region: "us-east-1".to_string(),
            concurrency: 8,
            queue_capacity: 256,
            provider_mode: ProviderMode::Aws,
        }
    }
}
