//! Stream client configuration.
//!
//! Endpoints, fallback policy and watchdog intervals. Defaults match the
//! production backend; every value can be overridden with a builder method or
//! a `CONVO_STREAM_*` environment variable.

use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default backend base URL (local development server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Default streaming endpoint path
pub const DEFAULT_STREAM_PATH: &str = "/v1/stream";
/// Default non-streaming endpoint path used by the fallback
pub const DEFAULT_FALLBACK_PATH: &str = "/v1/ask";
/// Guard window before the JSON fallback fires
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(15);
/// First-token watchdog interval
pub const DEFAULT_FIRST_TOKEN_TIMEOUT: Duration = Duration::from_secs(25);
/// Steady (between chunks) watchdog interval
pub const DEFAULT_STEADY_TIMEOUT: Duration = Duration::from_secs(30);
/// Typing indicator watchdog interval
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(45);

pub const ENV_URL: &str = "CONVO_STREAM_URL";
pub const ENV_FALLBACK: &str = "CONVO_STREAM_FALLBACK";
pub const ENV_FALLBACK_MS: &str = "CONVO_STREAM_FALLBACK_MS";
pub const ENV_FIRST_TOKEN_MS: &str = "CONVO_STREAM_FIRST_TOKEN_MS";
pub const ENV_STEADY_MS: &str = "CONVO_STREAM_STEADY_MS";
pub const ENV_TYPING_MS: &str = "CONVO_STREAM_TYPING_MS";

/// Malformed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a number of milliseconds, got '{value}'")]
    InvalidDuration { var: String, value: String },

    #[error("{var} must be true/false/1/0, got '{value}'")]
    InvalidBool { var: String, value: String },

    #[error("base URL must start with http:// or https://, got '{0}'")]
    InvalidUrl(String),
}

/// Configuration for a [`ChatClient`](crate::client::ChatClient).
///
/// # Example
///
/// ```ignore
/// use convo_stream::config::StreamConfig;
/// use std::time::Duration;
///
/// let config = StreamConfig::default()
///     .with_base_url("https://api.example.com")
///     .with_fallback_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Scheme + host (+ optional prefix), without trailing slash
    pub base_url: String,
    /// Path of the SSE endpoint
    pub stream_path: String,
    /// Path of the JSON endpoint used by the fallback
    pub fallback_path: String,
    /// Whether a stalled stream may be replaced by one JSON request
    pub fallback_enabled: bool,
    pub fallback_timeout: Duration,
    pub first_token_timeout: Duration,
    pub steady_timeout: Duration,
    pub typing_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
            fallback_enabled: true,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            first_token_timeout: DEFAULT_FIRST_TOKEN_TIMEOUT,
            steady_timeout: DEFAULT_STEADY_TIMEOUT,
            typing_timeout: DEFAULT_TYPING_TIMEOUT,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL (a trailing slash is dropped).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the SSE endpoint path.
    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Set the JSON fallback endpoint path.
    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    /// Enable or disable the JSON fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    pub fn with_first_token_timeout(mut self, timeout: Duration) -> Self {
        self.first_token_timeout = timeout;
        self
    }

    pub fn with_steady_timeout(mut self, timeout: Duration) -> Self {
        self.steady_timeout = timeout;
        self
    }

    pub fn with_typing_timeout(mut self, timeout: Duration) -> Self {
        self.typing_timeout = timeout;
        self
    }

    /// Full URL of the SSE endpoint.
    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    /// Full URL of the JSON fallback endpoint.
    pub fn fallback_url(&self) -> String {
        join_url(&self.base_url, &self.fallback_path)
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
            Ok(())
        } else {
            Err(ConfigError::InvalidUrl(self.base_url.clone()))
        }
    }

    /// Defaults overridden by `CONVO_STREAM_*` variables.
    ///
    /// Malformed values are logged and skipped.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok(), false).unwrap_or_default()
    }

    /// Like [`from_env`](Self::from_env), but malformed values are errors.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), true)
    }

    fn from_lookup<F>(lookup: F, strict: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Lenient mode keeps the default for a malformed value.
        let keep = |result: Result<(), ConfigError>| -> Result<(), ConfigError> {
            match result {
                Err(e) if !strict => {
                    warn!("Ignoring invalid configuration: {}", e);
                    Ok(())
                }
                other => other,
            }
        };

        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            let candidate = config.clone().with_base_url(url.trim());
            keep(candidate.validate().map(|_| config = candidate))?;
        }
        if let Some(value) = lookup(ENV_FALLBACK) {
            keep(parse_bool(ENV_FALLBACK, &value).map(|b| config.fallback_enabled = b))?;
        }

        let durations: [(&str, &mut Duration); 4] = [
            (ENV_FALLBACK_MS, &mut config.fallback_timeout),
            (ENV_FIRST_TOKEN_MS, &mut config.first_token_timeout),
            (ENV_STEADY_MS, &mut config.steady_timeout),
            (ENV_TYPING_MS, &mut config.typing_timeout),
        ];
        for (var, slot) in durations {
            if let Some(value) = lookup(var) {
                keep(parse_millis(var, &value).map(|d| *slot = d))?;
            }
        }

        Ok(config)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_millis(var: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDuration {
            var: var.to_string(),
            value: value.to_string(),
        })
}
