//! Connectors shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use portprobe::Connector;
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Behaviour of a simulated peer on ports that are not open
#[derive(Debug, Clone, Copy)]
pub enum Closed {
    Refuse,
    /// Never answers; only the scan timeout ends the attempt
    Hang,
    /// Answers with a reset after a delay
    RefuseAfter(Duration),
    /// Fails at once with a socket error other than a refusal
    Fail(io::ErrorKind),
}

/// Scripted peer that counts every attempt and tracks peak parallelism
pub struct SimulatedPeer {
    open: HashSet<u16>,
    closed: Closed,
    failing: HashMap<u16, io::ErrorKind>,
    open_delay: Duration,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SimulatedPeer {
    pub fn new(open: &[u16], closed: Closed) -> Self {
        Self {
            open: open.iter().copied().collect(),
            closed,
            failing: HashMap::new(),
            open_delay: Duration::ZERO,
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn refusing(open: &[u16]) -> Self {
        Self::new(open, Closed::Refuse)
    }

    pub fn hanging() -> Self {
        Self::new(&[], Closed::Hang)
    }

    /// Delay before an open port accepts
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Fail `ports` with `kind` regardless of the closed-port behaviour
    pub fn failing_on(mut self, ports: impl IntoIterator<Item = u16>, kind: io::ErrorKind) -> Self {
        self.failing.extend(ports.into_iter().map(|port| (port, kind)));
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for SimulatedPeer {
    async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if self.open.contains(&addr.port()) {
            tokio::time::sleep(self.open_delay).await;
            return Ok(());
        }
        if let Some(&kind) = self.failing.get(&addr.port()) {
            return Err(kind.into());
        }

        match self.closed {
            Closed::Refuse => Err(io::ErrorKind::ConnectionRefused.into()),
            Closed::Hang => std::future::pending().await,
            Closed::RefuseAfter(delay) => {
                tokio::time::sleep(delay).await;
                Err(io::ErrorKind::ConnectionRefused.into())
            }
            Closed::Fail(kind) => Err(kind.into()),
        }
    }
}

/// Port nothing listens on (bound, then released)
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
