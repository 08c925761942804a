//! Configuration for the gateway connection engine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gateway_protocol::FramingMode;

/// Configuration for a gateway connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Framing discipline for the session. Fixed per connection attempt,
    /// never renegotiated mid-session.
    pub framing: FramingModeConfig,

    /// Follow redirect instructions from the gateway. When disabled, a
    /// redirect to a different endpoint is reported as a connect failure.
    pub allow_redirect: bool,

    /// Return from `connect` as soon as the negotiation request is sent
    /// instead of blocking until the gateway's version answer arrives.
    pub async_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            framing: FramingModeConfig::LengthPrefixed,
            allow_redirect: false,
            async_connect: false,
        }
    }
}

/// Serializable mirror of [`FramingMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingModeConfig {
    LengthPrefixed,
    Legacy,
}

impl From<FramingModeConfig> for FramingMode {
    fn from(mode: FramingModeConfig) -> Self {
        match mode {
            FramingModeConfig::LengthPrefixed => FramingMode::LengthPrefixed,
            FramingModeConfig::Legacy => FramingMode::Legacy,
        }
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// The session's framing discipline.
    pub fn framing_mode(&self) -> FramingMode {
        self.framing.into()
    }
}
