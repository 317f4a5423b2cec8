//! Configuration file parsing.
//!
//! Parses TOML configuration files for the driver: the serial device to
//! open, the driver's timeouts, and the endpoint table the controller
//! reconciles against the coprocessor on startup.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub znp: ZnpConfig,
}

/// Everything the controller needs to drive one coprocessor session.
#[derive(Debug, Clone, Deserialize)]
pub struct ZnpConfig {
    pub device: DeviceConfig,

    /// Application endpoints the controller ensures are registered on the
    /// coprocessor; see `controller::startup`'s endpoint reconciliation.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

fn default_baud() -> u32 {
    115_200
}

fn default_sreq_timeout_ms() -> u64 {
    15_000
}

fn default_auto_reconnect_retry_delay_ms() -> u64 {
    5_000
}

fn default_zdo_request_timeout_ms() -> u64 {
    15_000
}

/// Serial device settings and the driver's configurable timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Serial device path, or the literal string `"auto"` to trigger
    /// `controller::probe`'s port-scanning auto-detect.
    pub path: String,

    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Write the bootloader force-run byte as the first byte on connect.
    #[serde(default)]
    pub skip_bootloader: bool,

    #[serde(default = "default_sreq_timeout_ms")]
    pub sreq_timeout_ms: u64,

    #[serde(default = "default_auto_reconnect_retry_delay_ms")]
    pub auto_reconnect_retry_delay_ms: u64,

    #[serde(default = "default_zdo_request_timeout_ms")]
    pub zdo_request_timeout_ms: u64,

    /// `SYS.SetTxPower` is only issued during startup when this is set.
    #[serde(default)]
    pub tx_power: Option<u8>,
}

impl DeviceConfig {
    pub fn sreq_timeout(&self) -> Duration {
        Duration::from_millis(self.sreq_timeout_ms)
    }

    pub fn auto_reconnect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.auto_reconnect_retry_delay_ms)
    }

    pub fn zdo_request_timeout(&self) -> Duration {
        Duration::from_millis(self.zdo_request_timeout_ms)
    }

    pub fn is_auto(&self) -> bool {
        self.path == "auto"
    }
}

/// One `AF.Register`-shaped application endpoint the controller keeps
/// present on the coprocessor.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    #[serde(default)]
    pub device_version: u8,
    #[serde(default)]
    pub input_clusters: Vec<u16>,
    #[serde(default)]
    pub output_clusters: Vec<u16>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.znp.device.path.is_empty() {
            return Err(ConfigError::Invalid(
                "znp.device.path must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for ep in &self.znp.endpoints {
            if !seen.insert(ep.endpoint) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint {} in znp.endpoints",
                    ep.endpoint
                )));
            }
        }

        Ok(())
    }
}
