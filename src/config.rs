//! Configuration for RakshaIO
//!
//! Loads configuration from a TOML file. Every section has defaults matching
//! the stock wiring (both devices on `/dev/ttyUSB0` at 9600 baud).

use crate::devices::secure_module::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_RETRY_DELAY_MS,
};
use crate::devices::secure_module::link::RetryPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub secure_module: SecureModuleConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

/// Secure module serial link
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecureModuleConfig {
    /// Serial port path
    pub port: String,
    pub baud_rate: u32,
    /// Window for a complete response to arrive
    pub read_timeout_ms: u64,
    /// Port-level read timeout; cancellation is checked between polls
    pub poll_interval_ms: u64,
    /// Delay between open attempts
    pub retry_delay_ms: u64,
    /// Open retry policy for interactive commands
    pub retry_policy: RetryPolicy,
}

/// Particulate sensor serial link and sampling period
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Window for one sensor frame to arrive
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// Time between samples
    pub sample_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for SecureModuleConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl SecureModuleConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            sample_interval_ms: 1000,
        }
    }
}

impl SensorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Built-in configuration used when no file is present
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use raksha_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("raksha.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the link layer cannot work with
    pub fn validate(&self) -> Result<()> {
        let sm = &self.secure_module;
        check_link(
            "secure_module",
            &sm.port,
            sm.baud_rate,
            sm.read_timeout_ms,
            sm.poll_interval_ms,
        )?;
        let s = &self.sensor;
        check_link(
            "sensor",
            &s.port,
            s.baud_rate,
            s.read_timeout_ms,
            s.poll_interval_ms,
        )?;
        if s.sample_interval_ms == 0 {
            return Err(Error::Config("sensor.sample_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

fn check_link(
    section: &str,
    port: &str,
    baud: u32,
    read_timeout_ms: u64,
    poll_ms: u64,
) -> Result<()> {
    if port.is_empty() {
        return Err(Error::Config(format!("{}.port must not be empty", section)));
    }
    if baud == 0 {
        return Err(Error::Config(format!("{}.baud_rate must be > 0", section)));
    }
    if read_timeout_ms == 0 || poll_ms == 0 {
        return Err(Error::Config(format!(
            "{}: read_timeout_ms and poll_interval_ms must be > 0",
            section
        )));
    }
    if poll_ms > read_timeout_ms {
        return Err(Error::Config(format!(
            "{}.poll_interval_ms ({}) exceeds read_timeout_ms ({})",
            section, poll_ms, read_timeout_ms
        )));
    }
    Ok(())
}
