//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// Default base URL of the recording service
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Microphone processing requested at acquisition time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub cadence: Option<String>,
    pub request_timeout: Option<String>,
    pub drain_timeout: Option<String>,
    pub flush_on_stop: Option<bool>,
    pub notify: Option<bool>,
    pub capture: Option<CaptureConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            api_url: Some(DEFAULT_API_URL.to_string()),
            token: None,
            cadence: Some(Duration::default_cadence().to_string()),
            request_timeout: Some(Duration::default_request_timeout().to_string()),
            drain_timeout: Some(Duration::default_drain_timeout().to_string()),
            flush_on_stop: Some(true),
            notify: Some(false),
            capture: Some(CaptureConfig {
                echo_cancellation: Some(true),
                noise_suppression: Some(true),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_url: other.api_url.or(self.api_url),
            token: other.token.or(self.token),
            cadence: other.cadence.or(self.cadence),
            request_timeout: other.request_timeout.or(self.request_timeout),
            drain_timeout: other.drain_timeout.or(self.drain_timeout),
            flush_on_stop: other.flush_on_stop.or(self.flush_on_stop),
            notify: other.notify.or(self.notify),
            capture: Self::merge_capture_config(self.capture, other.capture),
        }
    }

    /// Merge capture config sections
    fn merge_capture_config(
        base: Option<CaptureConfig>,
        other: Option<CaptureConfig>,
    ) -> Option<CaptureConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(CaptureConfig {
                echo_cancellation: o.echo_cancellation.or(b.echo_cancellation),
                noise_suppression: o.noise_suppression.or(b.noise_suppression),
            }),
        }
    }

    /// Get the service base URL without a trailing slash
    pub fn api_url_or_default(&self) -> String {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Get cadence as parsed Duration, or default if not set/invalid
    pub fn cadence_or_default(&self) -> Duration {
        Self::parse_or(&self.cadence, Duration::default_cadence())
    }

    /// Get request timeout as parsed Duration, or default if not set/invalid
    pub fn request_timeout_or_default(&self) -> Duration {
        Self::parse_or(&self.request_timeout, Duration::default_request_timeout())
    }

    /// Get drain timeout as parsed Duration, or default if not set/invalid
    pub fn drain_timeout_or_default(&self) -> Duration {
        Self::parse_or(&self.drain_timeout, Duration::default_drain_timeout())
    }

    /// Get flush-on-stop setting, or true if not set
    pub fn flush_on_stop_or_default(&self) -> bool {
        self.flush_on_stop.unwrap_or(true)
    }

    /// Get notify setting, or false if not set
    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }

    /// Get echo cancellation setting, or true if not set
    pub fn echo_cancellation_or_default(&self) -> bool {
        self.capture
            .as_ref()
            .and_then(|c| c.echo_cancellation)
            .unwrap_or(true)
    }

    /// Get noise suppression setting, or true if not set
    pub fn noise_suppression_or_default(&self) -> bool {
        self.capture
            .as_ref()
            .and_then(|c| c.noise_suppression)
            .unwrap_or(true)
    }

    fn parse_or(value: &Option<String>, default: Duration) -> Duration {
        value
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }
}
