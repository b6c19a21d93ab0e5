//! Configuration module for the portprobe scanner

use crate::network::PortRange;
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default target, port range and timeout mirror the classic
/// `scanme.nmap.org`, ports 20-1024, one second per connection.
pub const DEFAULT_TARGET: &str = "scanme.nmap.org";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CONCURRENCY: usize = 100;

/// How port attempts are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// One port at a time, strictly ascending
    Sequential,
    /// Fixed-size worker pool, results in discovery order
    #[default]
    Concurrent,
}

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target host name or IP literal
    pub target: String,

    /// Inclusive range of ports to attempt
    pub ports: PortRange,

    /// Timeout for each connection attempt, `timeout_ms` in config files
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Maximum number of simultaneous connection attempts
    pub concurrency: usize,

    /// Dispatch mode
    pub mode: ScanMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            ports: PortRange::default(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: DEFAULT_CONCURRENCY,
            mode: ScanMode::default(),
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Set the ports to scan
    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = ports;
        self
    }

    /// Set the per-connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the worker pool size
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Effective number of simultaneous attempts
    pub fn effective_concurrency(&self) -> usize {
        match self.mode {
            ScanMode::Sequential => 1,
            ScanMode::Concurrent => self.concurrency.min(self.ports.len()),
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from `~/.portprobe.toml`, falling back to defaults
    pub fn load_default_config() -> Self {
        let Some(home_dir) = dirs::home_dir() else {
            return Self::default();
        };

        let config_path = home_dir.join(".portprobe.toml");
        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.trim().is_empty() {
            return Err(ScanError::ConfigError("Target cannot be empty".to_string()));
        }

        if self.timeout.is_zero() {
            return Err(ScanError::ConfigError("Timeout must be greater than 0".to_string()));
        }

        if self.concurrency == 0 {
            return Err(ScanError::ConfigError("Concurrency must be greater than 0".to_string()));
        }

        // Already checked on construction; re-checked for hand-built values.
        PortRange::new(self.ports.low(), self.ports.high())?;

        Ok(())
    }
}

/// Config files carry the timeout as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        // Round up so a sub-millisecond timeout never becomes zero
        let mut millis = timeout.as_millis();
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        serializer.serialize_u64(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Convert a signed millisecond count, as typed by a user, into a timeout.
pub fn timeout_from_millis(millis: i64) -> crate::Result<Duration> {
    if millis <= 0 {
        return Err(ScanError::ConfigError(format!(
            "Timeout must be positive, got {}ms",
            millis
        )));
    }
    Ok(Duration::from_millis(millis as u64))
}
