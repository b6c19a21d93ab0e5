//! TCP connect attempts

use super::ConnectOutcome;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Establishes a TCP connection and closes it again.
///
/// Implementations do not enforce a deadline themselves; [`attempt`] wraps
/// every call in the scan timeout.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, addr: SocketAddr) -> io::Result<()>;
}

/// Connector backed by the operating system's TCP stack
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        let stream = TcpStream::connect(addr).await?;
        // No application data is exchanged; close right away.
        drop(stream);
        Ok(())
    }
}

#[async_trait]
impl<T: Connector + ?Sized> Connector for Arc<T> {
    async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        (**self).connect(addr).await
    }
}

/// Perform one connect attempt bounded by `timeout`
pub async fn attempt<C>(connector: &C, addr: SocketAddr, timeout: Duration) -> ConnectOutcome
where
    C: Connector + ?Sized,
{
    match tokio::time::timeout(timeout, connector.connect(addr)).await {
        Ok(result) => ConnectOutcome::from_io(result),
        Err(_) => ConnectOutcome::TimedOut,
    }
}
