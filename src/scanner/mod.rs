//! Scanner module containing the scanning engine and its result types

pub mod engine;

use crate::config::ScanConfig;
use crate::network::{ConnectOutcome, PortRange, PortReport};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use engine::ScanEngine;

/// Scan `target` over `ports`, bounding every connection by `timeout`.
///
/// Uses the default worker pool. Configuration and resolution errors are
/// returned before any port is attempted.
pub async fn scan(target: &str, ports: PortRange, timeout: Duration) -> crate::Result<ScanStream> {
    let config = ScanConfig::new(target)
        .with_ports(ports)
        .with_timeout(timeout);
    ScanEngine::new(config)?.scan().await
}

/// Snapshot of scan counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Completed attempts; an attempt still in flight is not counted yet
    pub attempted: u64,
    pub open: u64,
    pub refused: u64,
    pub timed_out: u64,
    /// Attempts that failed with any other socket error
    pub failed: u64,
    /// Dispatch was stopped before the whole range was attempted
    pub cancelled: bool,
}

impl ScanStats {
    /// Ports that were attempted and not reported
    pub fn closed_or_filtered(&self) -> u64 {
        self.refused + self.timed_out + self.failed
    }
}

/// Counters shared between the dispatcher, its workers and the stream.
#[derive(Debug, Default)]
pub(crate) struct ScanCounters {
    attempted: AtomicU64,
    open: AtomicU64,
    refused: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicBool,
}

impl ScanCounters {
    pub(crate) fn record(&self, outcome: &ConnectOutcome) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ConnectOutcome::Open => &self.open,
            ConnectOutcome::Refused => &self.refused,
            ConnectOutcome::TimedOut => &self.timed_out,
            ConnectOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ScanStats {
        ScanStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Lazy, single-use sequence of open-port reports in discovery order.
///
/// The stream ends once every dispatched attempt has finished. Dropping it
/// stops the dispatch of further attempts.
pub struct ScanStream {
    rx: mpsc::UnboundedReceiver<PortReport>,
    counters: Arc<ScanCounters>,
    dispatcher: JoinHandle<()>,
}

impl ScanStream {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<PortReport>,
        counters: Arc<ScanCounters>,
        dispatcher: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            counters,
            dispatcher,
        }
    }

    /// Wait for the next open port; `None` once the scan is exhausted
    pub async fn next_report(&mut self) -> Option<PortReport> {
        self.rx.recv().await
    }

    /// Counters so far; final once the stream has returned `None`
    pub fn stats(&self) -> ScanStats {
        self.counters.snapshot()
    }

    /// Whether every dispatched attempt has completed
    pub fn is_finished(&self) -> bool {
        self.dispatcher.is_finished()
    }
}

impl Stream for ScanStream {
    type Item = PortReport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Aggregate of a fully drained scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub target: String,
    /// Open ports, ascending
    pub open_ports: Vec<u16>,
    pub stats: ScanStats,
    pub duration: Duration,
}

impl ScanSummary {
    /// Get scan rate in ports per second
    pub fn scan_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.stats.attempted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
