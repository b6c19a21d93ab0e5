//! Error handling for the portprobe scanner
//!
//! Only scan-fatal conditions are represented here. A port that refuses,
//! times out or otherwise fails to connect is not an error; it is a
//! [`ConnectOutcome`](crate::network::ConnectOutcome) that the engine absorbs.

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Port range error: {0}")]
    PortRangeError(String),

    #[error("Failed to resolve target '{target}': {reason}")]
    ResolutionError { target: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ScanError {
    /// Errors detected before any network activity.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ScanError::ConfigError(_) | ScanError::PortRangeError(_) | ScanError::ParseError(_)
        )
    }

    pub fn is_resolution_error(&self) -> bool {
        matches!(self, ScanError::ResolutionError { .. })
    }

    pub(crate) fn resolution(target: &str, reason: impl ToString) -> Self {
        ScanError::ResolutionError {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for ScanError {
    fn from(e: std::num::ParseIntError) -> Self {
        ScanError::ParseError(e.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        ScanError::ConfigError(format!("Failed to parse TOML: {}", e))
    }
}
