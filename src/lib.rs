//! portprobe - a bounded, cancellable TCP connect port scanner
//!
//! Given a host and an inclusive port range, attempt a TCP connection to
//! every port with a fixed per-connection timeout and stream back each port
//! that accepts.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;

// Re-export commonly used types
pub use config::{ScanConfig, ScanMode};
pub use error::ScanError;
pub use network::{
    socket::{Connector, TcpConnector},
    ConnectOutcome, PortRange, PortReport, Target,
};
pub use scanner::{scan, ScanEngine, ScanStats, ScanStream, ScanSummary};
pub use tokio_util::sync::CancellationToken;

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;
