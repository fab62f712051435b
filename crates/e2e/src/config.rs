//! Smoke runner configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::connect::RetryPolicy;
use crate::error::{E2eError, E2eResult};

/// Everything the smoke test needs to know. Defaults reproduce the local
/// iOS simulator setup; any field can be overridden from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeConfig {
    /// Appium server URL
    pub server_url: String,

    /// Capabilities sent with the new-session request. A value in the file
    /// replaces the default set as a whole.
    pub capabilities: Capabilities,

    /// Session creation attempts
    pub max_retries: u32,

    /// Pause between failed session attempts
    pub retry_delay_ms: u64,

    /// HTTP timeout per WebDriver request
    pub request_timeout_ms: u64,

    /// Implicit element wait set on the session
    pub implicit_wait_ms: u64,

    /// Fixed pause after session start so the app can finish booting
    pub warmup_ms: u64,

    /// `ValueKey` of the widget to tap
    pub element_key: String,

    /// How long to wait for the widget to appear
    pub element_timeout_ms: u64,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4723".to_string(),
            capabilities: Capabilities::ios_flutter(),
            max_retries: 3,
            retry_delay_ms: 5_000,
            // Simulator boot plus app install can take minutes
            request_timeout_ms: 300_000,
            implicit_wait_ms: 60_000,
            warmup_ms: 10_000,
            element_key: "loginButton".to_string(),
            element_timeout_ms: 60_000,
        }
    }
}

impl SmokeConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> E2eResult<Self> {
        if !path.exists() {
            return Err(E2eError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work
    pub fn validate(&self) -> E2eResult<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(E2eError::Config(format!(
                "server_url must be an http(s) URL, got {}",
                self.server_url
            )));
        }
        if self.element_key.is_empty() {
            return Err(E2eError::Config("element_key must not be empty".to_string()));
        }
        if self.capabilities.is_empty() {
            return Err(E2eError::Config("capabilities must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}
