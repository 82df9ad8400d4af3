//! Client configuration, optionally loaded from TOML.
//!
//! A [`ClientConfig`] is fixed once a [`Client`](crate::Client) is built.
//! Durations are written in seconds (`*_s` keys) and read back through
//! [`Duration`] accessors.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;

/// Session client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Dotted destination name the hub announces under.
    #[serde(default = "default_dest_name")]
    pub dest_name: String,
    /// Largest bulk transfer the client will accept, in bytes.
    #[serde(default = "default_max_resource_bytes")]
    pub max_resource_bytes: u64,
    /// How long an announced transfer stays claimable.
    #[serde(default = "default_resource_expectation_ttl_s")]
    pub resource_expectation_ttl_s: f64,
    /// Upper bound on unclaimed transfer announcements.
    #[serde(default = "default_max_pending_resource_expectations")]
    pub max_pending_resource_expectations: usize,
    /// Spacing between HELLO attempts.
    #[serde(default = "default_hello_interval_s")]
    pub hello_interval_s: f64,
    #[serde(default = "default_hello_max_attempts")]
    pub hello_max_attempts: u32,
    /// Client name sent in HELLO.
    #[serde(default = "default_hello_name")]
    pub hello_name: String,
    /// Client version sent in HELLO.
    #[serde(default = "default_hello_version")]
    pub hello_version: String,
    /// Nickname sent alongside HELLO.
    pub nickname: Option<String>,
}

fn default_dest_name() -> String {
    "rrc.hub".to_string()
}

fn default_max_resource_bytes() -> u64 {
    262_144
}

fn default_resource_expectation_ttl_s() -> f64 {
    30.0
}

fn default_max_pending_resource_expectations() -> usize {
    8
}

fn default_hello_interval_s() -> f64 {
    3.0
}

fn default_hello_max_attempts() -> u32 {
    3
}

fn default_hello_name() -> String {
    "rrc-client".to_string()
}

fn default_hello_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dest_name: default_dest_name(),
            max_resource_bytes: default_max_resource_bytes(),
            resource_expectation_ttl_s: default_resource_expectation_ttl_s(),
            max_pending_resource_expectations: default_max_pending_resource_expectations(),
            hello_interval_s: default_hello_interval_s(),
            hello_max_attempts: default_hello_max_attempts(),
            hello_name: default_hello_name(),
            hello_version: default_hello_version(),
            nickname: None,
        }
    }
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot operate with.
    pub fn validate(&self) -> Result<(), ClientError> {
        rrc_core::app_and_aspects_from_name(&self.dest_name)
            .map_err(|e| ClientError::Config(format!("invalid dest_name: {e}")))?;
        if self.max_resource_bytes == 0 {
            return Err(ClientError::Config(
                "max_resource_bytes must be positive".into(),
            ));
        }
        if self.max_pending_resource_expectations == 0 {
            return Err(ClientError::Config(
                "max_pending_resource_expectations must be positive".into(),
            ));
        }
        if self.hello_max_attempts == 0 {
            return Err(ClientError::Config(
                "hello_max_attempts must be positive".into(),
            ));
        }
        check_seconds("resource_expectation_ttl_s", self.resource_expectation_ttl_s)?;
        check_seconds("hello_interval_s", self.hello_interval_s)?;
        Ok(())
    }

    #[must_use]
    pub fn resource_expectation_ttl(&self) -> Duration {
        seconds(self.resource_expectation_ttl_s)
    }

    #[must_use]
    pub fn hello_interval(&self) -> Duration {
        seconds(self.hello_interval_s)
    }
}

fn check_seconds(field: &str, value: f64) -> Result<(), ClientError> {
    if value.is_finite() && value > 0.0 && Duration::try_from_secs_f64(value).is_ok() {
        Ok(())
    } else {
        Err(ClientError::Config(format!(
            "{field} must be a positive number of seconds (got {value})"
        )))
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
