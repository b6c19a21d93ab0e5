//! Network module: port ranges, targets and per-port connect outcomes

pub mod resolver;
pub mod socket;

use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Inclusive interval of TCP ports, always `1 <= low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    low: u16,
    high: u16,
}

impl PortRange {
    /// Create a validated range
    pub fn new(low: u16, high: u16) -> crate::Result<Self> {
        if low == 0 || high == 0 {
            return Err(ScanError::PortRangeError("Port 0 is not valid".to_string()));
        }
        if low > high {
            return Err(ScanError::PortRangeError(format!(
                "Start port {} cannot be greater than end port {}",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    /// A range holding exactly one port
    pub fn single(port: u16) -> crate::Result<Self> {
        Self::new(port, port)
    }

    pub fn low(&self) -> u16 {
        self.low
    }

    pub fn high(&self) -> u16 {
        self.high
    }

    /// Number of ports in the range
    pub fn len(&self) -> usize {
        usize::from(self.high - self.low) + 1
    }

    /// Never true; a valid range holds at least one port.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.low..=self.high).contains(&port)
    }

    /// Ports in ascending order
    pub fn iter(&self) -> RangeInclusive<u16> {
        self.low..=self.high
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self { low: 20, high: 1024 }
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = RangeInclusive<u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

fn parse_port(text: &str, which: &str) -> crate::Result<u16> {
    // Parse wide first so 70000 is reported as out of range rather than wrapped.
    let value: u32 = text.trim().parse().map_err(|e| {
        ScanError::PortRangeError(format!("Invalid {} port '{}': {}", which, text.trim(), e))
    })?;
    u16::try_from(value).map_err(|_| {
        ScanError::PortRangeError(format!("Port {} is outside 1-65535", value))
    })
}

impl FromStr for PortRange {
    type Err = ScanError;

    /// Accepts `"low-high"` or a single `"port"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((low, high)) => PortRange::new(parse_port(low, "start")?, parse_port(high, "end")?),
            None => PortRange::single(parse_port(s, "single")?),
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}

/// A host as given by the user together with the address every attempt uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub addr: IpAddr,
}

impl Target {
    pub fn new(host: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            host: host.into(),
            addr,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == self.addr.to_string() {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{} ({})", self.host, self.addr)
        }
    }
}

/// Terminal state of a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake completed within the timeout
    Open,
    /// Peer answered with a reset
    Refused,
    /// No answer before the timeout expired
    TimedOut,
    /// Any other socket error (unreachable, permission, ...)
    Failed(io::ErrorKind),
}

impl ConnectOutcome {
    /// Classify the result of a connect that finished before the deadline
    pub fn from_io(result: io::Result<()>) -> Self {
        match result {
            Ok(()) => ConnectOutcome::Open,
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => ConnectOutcome::Refused,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => ConnectOutcome::TimedOut,
            Err(e) => ConnectOutcome::Failed(e.kind()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectOutcome::Open)
    }
}

impl fmt::Display for ConnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectOutcome::Open => write!(f, "open"),
            ConnectOutcome::Refused => write!(f, "closed"),
            ConnectOutcome::TimedOut => write!(f, "filtered"),
            ConnectOutcome::Failed(kind) => write!(f, "error ({:?})", kind),
        }
    }
}

/// One open port, as emitted by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReport {
    pub port: u16,
    pub target: String,
    pub addr: IpAddr,
}

impl PortReport {
    pub fn new(port: u16, target: &Target) -> Self {
        Self {
            port,
            target: target.host.clone(),
            addr: target.addr,
        }
    }
}

impl fmt::Display for PortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port {} open", self.port)
    }
}
