//! Configuration types for tiktok-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Main configuration
///
/// Fields are organized into logical sub-configs:
/// - [`backend`](BackendConfig): endpoint locations, encoding, anti-forgery cookie
/// - [`orchestrator`](OrchestratorConfig): throttle, flow policy, notices
/// - [`retry`](RetryConfig): rate-limit retry policy
/// - [`server`](ServerConfig): the bundled backend server
///
/// Every field has a default, so `Config::default()` works against a local backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoint settings used by the orchestrator
    #[serde(default)]
    pub backend: BackendConfig,

    /// Orchestration behavior
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Retry policy for rate-limited backend calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Backend server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Check settings that cannot be expressed in the type system
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.backend.base_url).map_err(|e| Error::Config {
            message: format!("invalid backend base URL {:?}: {}", self.backend.base_url, e),
            key: Some("backend.base_url".to_string()),
        })?;

        for (key, retry) in [
            ("retry", &self.retry),
            ("server.upstream_retry", &self.server.upstream_retry),
        ] {
            if retry.backoff_multiplier < 1.0 {
                return Err(Error::Config {
                    message: format!(
                        "backoff multiplier must be at least 1.0, got {}",
                        retry.backoff_multiplier
                    ),
                    key: Some(format!("{key}.backoff_multiplier")),
                });
            }
        }

        if self.orchestrator.event_capacity == 0 {
            return Err(Error::Config {
                message: "event channel capacity must be non-zero".to_string(),
                key: Some("orchestrator.event_capacity".to_string()),
            });
        }

        if self.server.cleanup_interval.is_zero() {
            return Err(Error::Config {
                message: "cleanup interval must be non-zero".to_string(),
                key: Some("server.cleanup_interval".to_string()),
            });
        }

        let rate_limit = &self.server.rate_limit;
        if rate_limit.enabled {
            if rate_limit.window.is_zero() {
                return Err(Error::Config {
                    message: "rate limit window must be non-zero".to_string(),
                    key: Some("server.rate_limit.window".to_string()),
                });
            }
            if rate_limit.max_requests == 0 {
                return Err(Error::Config {
                    message: "rate limit must allow at least one request per window".to_string(),
                    key: Some("server.rate_limit.max_requests".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// How request bodies are encoded for the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEncoding {
    /// `application/json` bodies (`{"url": ...}`)
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` bodies (`url=...`)
    Form,
}

/// Backend endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL the endpoint paths are resolved against (default: http://127.0.0.1:8000)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Info endpoint path (default: "/api/video-info/")
    #[serde(default = "default_info_path")]
    pub info_path: String,

    /// Process endpoint path (default: "/api/process/")
    #[serde(default = "default_process_path")]
    pub process_path: String,

    /// Request body encoding (default: json)
    #[serde(default)]
    pub encoding: RequestEncoding,

    /// Raw `Cookie` header to send; the `csrftoken` cookie is echoed as `X-CSRFToken`
    #[serde(default)]
    pub cookie: Option<String>,

    /// Upper bound on a single backend call (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            info_path: default_info_path(),
            process_path: default_process_path(),
            encoding: RequestEncoding::default(),
            cookie: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Whether a successful preview automatically continues into processing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPolicy {
    /// Preview first, process only on explicit confirmation
    #[default]
    TwoStep,
    /// Process with the submitted options as soon as the preview arrives
    Chained,
}

/// Orchestration behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay before every backend call to stay under upstream limits (default: 1000 ms)
    #[serde(default = "default_throttle_delay", with = "duration_ms_serde")]
    pub throttle_delay: Duration,

    /// Two-step or chained flow (default: two_step)
    #[serde(default)]
    pub flow: FlowPolicy,

    /// Case-insensitive substrings that mark an upstream error as a rate limit
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,

    /// How long transient notices stay visible (default: 3000 ms)
    #[serde(default = "default_notice_dismiss_after", with = "duration_ms_serde")]
    pub notice_dismiss_after: Duration,

    /// Capacity of the event broadcast channel (default: 64)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            throttle_delay: default_throttle_delay(),
            flow: FlowPolicy::default(),
            rate_limit_markers: default_rate_limit_markers(),
            notice_dismiss_after: default_notice_dismiss_after(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Retry configuration for transient failures
///
/// `max_attempts` counts retries after the first call; `0` disables retrying.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 2000 ms)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30000 ms)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fixed-interval retries, matching the upstream retry loop of the backend server
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Backend server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Directory processed media is written to (default: "downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Files older than this are removed by the cleanup task (default: 24 hours)
    #[serde(default = "default_file_retention", with = "duration_ms_serde")]
    pub file_retention: Duration,

    /// How often the cleanup task runs (default: 1 hour)
    #[serde(default = "default_cleanup_interval", with = "duration_ms_serde")]
    pub cleanup_interval: Duration,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Per-IP request limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retries of transient failures when talking to the media source
    /// (default: 2 retries, 1 second apart)
    #[serde(default = "default_upstream_retry")]
    pub upstream_retry: RetryConfig,

    /// Media resolution API (default: https://www.tikwm.com/api/)
    #[serde(default = "default_source_api_url")]
    pub source_api_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            download_dir: default_download_dir(),
            file_retention: default_file_retention(),
            cleanup_interval: default_cleanup_interval(),
            cors_enabled: true,
            rate_limit: RateLimitConfig::default(),
            upstream_retry: default_upstream_retry(),
            source_api_url: default_source_api_url(),
        }
    }
}

/// Rate limiting configuration
///
/// Requests are counted per client IP over a sliding window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per window and IP (default: 10)
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Window length (default: 1 hour)
    #[serde(default = "default_window", with = "duration_ms_serde")]
    pub window: Duration,

    /// Path prefixes that are limited (default: the process endpoints)
    #[serde(default = "default_limited_paths")]
    pub paths: Vec<String>,

    /// IPs exempt from rate limiting
    #[serde(default)]
    pub exempt_ips: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window: default_window(),
            paths: default_limited_paths(),
            exempt_ips: Vec::new(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_info_path() -> String {
    "/api/video-info/".to_string()
}

fn default_process_path() -> String {
    "/api/process/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_throttle_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_rate_limit_markers() -> Vec<String> {
    vec![
        "api limit".into(),
        "rate limit".into(),
        "too many requests".into(),
    ]
}

fn default_notice_dismiss_after() -> Duration {
    Duration::from_millis(3000)
}

fn default_event_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_file_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_upstream_retry() -> RetryConfig {
    RetryConfig::fixed(2, Duration::from_secs(1))
}

fn default_source_api_url() -> String {
    "https://www.tikwm.com/api/".to_string()
}

fn default_max_requests() -> usize {
    10
}

fn default_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_limited_paths() -> Vec<String> {
    vec!["/process/".to_string(), "/api/process/".to_string()]
}

// Duration serialization helper (milliseconds)
pub(crate) mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
pub(crate) mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
