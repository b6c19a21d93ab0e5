//! Target resolution
//!
//! A scan resolves its target exactly once, before any port is attempted.

use super::Target;
use crate::ScanError;
use std::net::{IpAddr, SocketAddr};

/// Resolve a host name or IP literal to the address used for the whole scan.
///
/// IP literals never touch DNS. For names that resolve to both families the
/// first IPv4 address wins, otherwise the first address returned.
pub async fn resolve(host: &str) -> crate::Result<Target> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ScanError::ConfigError("Target cannot be empty".to_string()));
    }

    // Check if it's already an IP address
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(Target::new(literal, ip));
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| ScanError::resolution(host, e))?
        .collect();

    let addr = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .ok_or_else(|| ScanError::resolution(host, "no addresses found"))?;

    log::debug!("Resolved {} to {} ({} candidates)", host, addr, addrs.len());
    Ok(Target::new(host, addr))
}
