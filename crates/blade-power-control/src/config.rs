//! Configuration for power tasks and the appliance client.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Timing parameters for a power change.
///
/// The executor performs at most `max_iterations` task checks, waiting
/// `wait_time_seconds` after each, so a change gives up after roughly
/// `max_iterations * wait_time_seconds` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PowerTaskConfig {
    /// Maximum number of task status checks.
    #[serde(default = "PowerTaskConfig::default_max_iterations")]
    pub max_iterations: u32,

    /// Seconds to wait between task status checks.
    #[serde(default = "PowerTaskConfig::default_wait_time")]
    pub wait_time_seconds: u64,
}

impl PowerTaskConfig {
    const fn default_max_iterations() -> u32 {
        36
    }

    const fn default_wait_time() -> u64 {
        10
    }

    /// Create a config with the given iteration bound and wait time.
    #[must_use]
    pub const fn new(max_iterations: u32, wait_time_seconds: u64) -> Self {
        Self {
            max_iterations,
            wait_time_seconds,
        }
    }

    /// Get the wait between checks as a `Duration`.
    #[must_use]
    pub const fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_seconds)
    }

    /// Upper bound on the time spent waiting between checks.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.wait_time()
            .checked_mul(self.max_iterations)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for PowerTaskConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::default_max_iterations(),
            wait_time_seconds: Self::default_wait_time(), // 36 checks, 6 minutes
        }
    }
}

/// Configuration for the HTTP appliance client.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the appliance; relative URIs are resolved against it.
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Value sent in the `X-API-Version` header.
    #[serde(default = "ClientConfig::default_api_version")]
    pub api_version: u32,

    /// Pre-established session token sent in the `Auth` header.
    #[serde(default)]
    pub session_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "https://localhost".to_string()
    }

    const fn default_api_version() -> u32 {
        800
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Create a config for the appliance at `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_version: Self::default_api_version(),
            session_token: None,
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

// Keeps the session token out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .finish()
    }
}
