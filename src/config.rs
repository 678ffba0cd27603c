//! Configuration types for the prediction client and local compositing

use crate::error::{BgComposeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint of the prediction service
pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Model version addressed when none is configured.
///
/// This is the identifier the web frontend shipped with. Which model it
/// resolves to is decided by the service; nothing here depends on it.
pub const DEFAULT_MODEL_VERSION: &str =
    "b4a8ce3f6e0f1a8a723af3073b90551c73c4a7e4b2a7d2f2f2d1f2b3f4a5b6c7";

/// Environment variable holding the bearer token
pub const API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";
/// Environment variable overriding the service endpoint
pub const API_BASE_ENV: &str = "REPLICATE_API_BASE";
/// Environment variable overriding the model version
pub const MODEL_VERSION_ENV: &str = "REPLICATE_MODEL_VERSION";

/// Output image format options for rendered results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency, alpha is dropped)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// MIME type used in the data URL header
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Budget for polling a prediction job until it reaches a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay between two status requests
    pub interval: Duration,
    /// Maximum number of status requests
    pub max_attempts: u32,
    /// Wall-clock budget measured from job creation
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    /// Validate the policy
    ///
    /// # Errors
    /// - Zero poll interval
    /// - Zero attempts
    /// - Zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(BgComposeError::config_value_error(
                "poll interval",
                format!("{:?}", self.interval),
                "> 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(BgComposeError::config_value_error(
                "max attempts",
                self.max_attempts,
                ">= 1",
            ));
        }
        if self.timeout.is_zero() {
            return Err(BgComposeError::config_value_error(
                "poll timeout",
                format!("{:?}", self.timeout),
                "> 0",
            ));
        }
        Ok(())
    }
}

/// Configuration of the remote prediction client
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bearer token sent with every request
    #[serde(skip_serializing, default)]
    pub api_token: String,

    /// Base URL of the prediction API (no trailing slash)
    pub base_url: String,

    /// Model version identifier sent with each job
    pub model_version: String,

    /// Poll budget
    pub poll: PollPolicy,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model_version", &self.model_version)
            .field("poll", &self.poll)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with the given token and defaults for everything else
    #[must_use]
    pub fn new<S: Into<String>>(api_token: S) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            poll: PollPolicy::default(),
        }
    }

    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgcompose::config::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::builder("r8_token")
    ///     .poll_interval(Duration::from_millis(500))
    ///     .max_attempts(60)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.poll.max_attempts, 60);
    /// ```
    #[must_use]
    pub fn builder<S: Into<String>>(api_token: S) -> ClientConfigBuilder {
        ClientConfigBuilder::new(api_token)
    }

    /// Build a configuration from the process environment
    ///
    /// Reads `REPLICATE_API_TOKEN` and the optional `REPLICATE_API_BASE`
    /// and `REPLICATE_MODEL_VERSION` overrides.
    ///
    /// # Errors
    /// - `REPLICATE_API_TOKEN` is unset or empty
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(API_TOKEN_ENV).unwrap_or_default();
        let mut builder = Self::builder(token);
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            builder = builder.base_url(base);
        }
        if let Ok(version) = std::env::var(MODEL_VERSION_ENV) {
            builder = builder.model_version(version);
        }
        builder.build()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Empty token, base URL or model version
    /// - Base URL that is not http(s)
    /// - Invalid poll policy
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(BgComposeError::invalid_config(format!(
                "API token is empty (set {} or pass it explicitly)",
                API_TOKEN_ENV
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(BgComposeError::invalid_config(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.model_version.trim().is_empty() {
            return Err(BgComposeError::invalid_config("Model version is empty"));
        }
        self.poll.validate()
    }

    /// URL of the job creation endpoint
    #[must_use]
    pub fn predictions_url(&self) -> String {
        format!("{}/predictions", self.base_url)
    }

    /// URL of a job's status endpoint
    #[must_use]
    pub fn prediction_url(&self, id: &str) -> String {
        format!("{}/predictions/{}", self.base_url, id)
    }
}

/// Builder for `ClientConfig`
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn new<S: Into<String>>(api_token: S) -> Self {
        Self {
            config: ClientConfig::new(api_token),
        }
    }

    #[must_use]
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn model_version<S: Into<String>>(mut self, model_version: S) -> Self {
        self.config.model_version = model_version.into();
        self
    }

    #[must_use]
    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.config.poll = poll;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll.interval = interval;
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.poll.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.poll.timeout = timeout;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - See [`ClientConfig::validate`]
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for local compositing and output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Encoding of rendered outputs
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

impl ComposeConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// - JPEG quality above 100
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(BgComposeError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
            ));
        }
        Ok(())
    }
}
