//! Main scanning engine implementation

use crate::config::{ScanConfig, ScanMode};
use crate::network::{
    resolver,
    socket::{self, Connector, TcpConnector},
    PortRange, PortReport, Target,
};
use crate::scanner::{ScanCounters, ScanStream, ScanSummary};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Main scanning engine
///
/// Holds a validated configuration and the connector used for every attempt.
/// The engine keeps no per-scan state; each call to [`ScanEngine::scan`]
/// resolves the target afresh and returns an independent stream.
pub struct ScanEngine<C = TcpConnector> {
    config: ScanConfig,
    connector: Arc<C>,
}

impl ScanEngine<TcpConnector> {
    /// Create a new scan engine with the given configuration
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> ScanEngine<C> {
    /// Create an engine that attempts connections through `connector`
    pub fn with_connector(config: ScanConfig, connector: C) -> crate::Result<Self> {
        config.validate()?;
        log::debug!("Scan engine configured: {:?}", config);

        Ok(Self {
            config,
            connector: Arc::new(connector),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Start a scan that runs until the whole range has been attempted
    pub async fn scan(&self) -> crate::Result<ScanStream> {
        self.scan_with_cancel(CancellationToken::new()).await
    }

    /// Start a scan that stops dispatching new attempts once `cancel` fires.
    ///
    /// Attempts already in flight run to completion (bounded by the timeout)
    /// and any open ports they find are still reported.
    pub async fn scan_with_cancel(&self, cancel: CancellationToken) -> crate::Result<ScanStream> {
        let target = resolver::resolve(&self.config.target).await?;
        let workers = self.config.effective_concurrency();

        log::info!(
            "Scanning {} ports {} ({:?} mode, {} workers, timeout {:?})",
            target,
            self.config.ports,
            self.config.mode,
            workers,
            self.config.timeout_duration()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(ScanCounters::default());
        let job = ScanJob {
            target,
            ports: self.config.ports,
            timeout: self.config.timeout_duration(),
            connector: Arc::clone(&self.connector),
            counters: Arc::clone(&counters),
            tx,
            cancel,
        };

        let dispatcher = match self.config.mode {
            ScanMode::Sequential => tokio::spawn(job.run_sequential()),
            ScanMode::Concurrent => tokio::spawn(Arc::new(job).run_concurrent(workers)),
        };

        Ok(ScanStream::new(rx, counters, dispatcher))
    }

    /// Run a scan to completion and collect every open port
    pub async fn scan_all(&self) -> crate::Result<ScanSummary> {
        let start_time = Instant::now();
        let mut stream = self.scan().await?;

        let mut open_ports = Vec::new();
        while let Some(report) = stream.next().await {
            open_ports.push(report.port);
        }
        open_ports.sort_unstable();

        Ok(ScanSummary {
            target: self.config.target.clone(),
            open_ports,
            stats: stream.stats(),
            duration: start_time.elapsed(),
        })
    }
}

/// Everything one scan's dispatcher and workers share
struct ScanJob<C> {
    target: Target,
    ports: PortRange,
    timeout: Duration,
    connector: Arc<C>,
    counters: Arc<ScanCounters>,
    tx: mpsc::UnboundedSender<PortReport>,
    cancel: CancellationToken,
}

impl<C: Connector> ScanJob<C> {
    /// Cancelled, or nobody is listening for results any more
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    fn stop_early(&self, port: u16) {
        log::warn!(
            "Scan of {} stopped before port {}; no further ports dispatched",
            self.target,
            port
        );
        self.counters.mark_cancelled();
    }

    async fn attempt_port(&self, port: u16) {
        let addr = SocketAddr::new(self.target.addr, port);
        let outcome = socket::attempt(self.connector.as_ref(), addr, self.timeout).await;
        self.counters.record(&outcome);

        if outcome.is_open() {
            // A closed receiver only means the consumer lost interest.
            let _ = self.tx.send(PortReport::new(port, &self.target));
        } else {
            log::trace!("{} {}", addr, outcome);
        }
    }

    fn finish(&self) {
        let stats = self.counters.snapshot();
        log::info!(
            "Scan of {} finished: {} attempted, {} open, {} refused, {} timed out, {} failed",
            self.target,
            stats.attempted,
            stats.open,
            stats.refused,
            stats.timed_out,
            stats.failed
        );
    }

    /// One port at a time, ascending
    async fn run_sequential(self) {
        for port in self.ports {
            if self.should_stop() {
                self.stop_early(port);
                break;
            }
            self.attempt_port(port).await;
        }
        self.finish();
    }

    /// Worker pool of `workers` simultaneous attempts
    async fn run_concurrent(self: Arc<Self>, workers: usize) {
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for port in self.ports {
            if self.should_stop() {
                self.stop_early(port);
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.stop_early(port);
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = Arc::clone(&self);
            tasks.spawn(async move {
                let _permit = permit; // Keep permit alive
                job.attempt_port(port).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Port attempt task failed: {}", e);
            }
        }
        self.finish();
    }
}
