//! Worker pool, time bounds and cancellation, driven by simulated peers on a
//! paused clock so the timing assertions are exact.

mod common;

use common::{Closed, SimulatedPeer};
use futures::StreamExt;
use portprobe::{CancellationToken, PortRange, ScanConfig, ScanEngine, ScanMode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config(low: u16, high: u16, timeout_ms: u64, concurrency: usize) -> ScanConfig {
    ScanConfig::new("127.0.0.1")
        .with_ports(PortRange::new(low, high).unwrap())
        .with_timeout(Duration::from_millis(timeout_ms))
        .with_concurrency(concurrency)
        .with_mode(ScanMode::Concurrent)
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_range_bounded_by_pool_and_timeout() {
    let peer = Arc::new(SimulatedPeer::hanging());
    let engine = ScanEngine::with_connector(config(1, 1024, 200, 100), Arc::clone(&peer)).unwrap();

    let start = Instant::now();
    let summary = engine.scan_all().await.unwrap();
    let elapsed = start.elapsed();

    // ceil(1024 / 100) rounds of one timeout each
    assert!(elapsed >= Duration::from_millis(11 * 200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(12 * 200), "{elapsed:?}");
    assert!(summary.open_ports.is_empty());
    assert_eq!(summary.stats.timed_out, 1024);
    assert_eq!(peer.attempts(), 1024);
}

#[tokio::test(start_paused = true)]
async fn test_ssh_and_https_only_scenario() {
    // Listeners on 22 and 443, everything else silently dropped
    let peer = Arc::new(SimulatedPeer::new(&[22, 443], Closed::Hang));
    let engine = ScanEngine::with_connector(config(1, 1024, 200, 200), Arc::clone(&peer)).unwrap();

    let start = Instant::now();
    let mut stream = engine.scan().await.unwrap();
    let mut found = HashSet::new();
    while let Some(report) = stream.next().await {
        assert!(found.insert(report.port), "port {} reported twice", report.port);
    }

    assert_eq!(found, HashSet::from([22, 443]));
    // ceil(1024 / 200) rounds, independent of how many ports are closed
    assert!(start.elapsed() < Duration::from_millis(7 * 200), "{:?}", start.elapsed());
    let stats = stream.stats();
    assert_eq!(stats.attempted, 1024);
    assert_eq!(stats.open, 2);
    assert_eq!(stats.timed_out, 1022);
}

#[tokio::test]
async fn test_pool_never_exceeds_concurrency() {
    let peer = Arc::new(SimulatedPeer::new(&[], Closed::RefuseAfter(Duration::from_millis(2))));
    let engine = ScanEngine::with_connector(config(1, 400, 500, 25), Arc::clone(&peer)).unwrap();

    let summary = engine.scan_all().await.unwrap();

    assert_eq!(summary.stats.attempted, 400);
    assert!(peer.peak_in_flight() <= 25, "peak {}", peer.peak_in_flight());
    assert!(peer.peak_in_flight() > 1, "pool never ran in parallel");
}

#[tokio::test]
async fn test_sequential_runs_one_at_a_time() {
    let peer = Arc::new(SimulatedPeer::new(&[3, 9], Closed::RefuseAfter(Duration::from_millis(1))));
    let engine = ScanEngine::with_connector(
        config(1, 12, 500, 100).with_mode(ScanMode::Sequential),
        Arc::clone(&peer),
    )
    .unwrap();

    let reports: Vec<u16> = engine.scan().await.unwrap().map(|r| r.port).collect().await;

    assert_eq!(reports, vec![3, 9]);
    assert_eq!(peer.peak_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_result_set_matches_sequential_oracle() {
    let open = [7, 80, 81, 443, 999];
    // Open ports answer slowly so concurrent discovery order differs from port order
    let slow_peer = || {
        Arc::new(SimulatedPeer::refusing(&open).with_open_delay(Duration::from_millis(30)))
    };

    let sequential = ScanEngine::with_connector(
        config(1, 1000, 100, 50).with_mode(ScanMode::Sequential),
        slow_peer(),
    )
    .unwrap();
    let oracle: Vec<u16> = sequential.scan().await.unwrap().map(|r| r.port).collect().await;
    assert_eq!(oracle, open.to_vec());

    let concurrent = ScanEngine::with_connector(config(1, 1000, 100, 50), slow_peer()).unwrap();
    for _ in 0..2 {
        let found: HashSet<u16> = concurrent.scan().await.unwrap().map(|r| r.port).collect().await;
        assert_eq!(found, oracle.iter().copied().collect::<HashSet<u16>>());
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_dispatch_and_lets_in_flight_finish() {
    let peer = Arc::new(SimulatedPeer::hanging());
    let engine = ScanEngine::with_connector(config(1, 1000, 100, 10), Arc::clone(&peer)).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let mut stream = engine.scan_with_cancel(cancel).await.unwrap();
    while stream.next().await.is_some() {}
    let elapsed = start.elapsed();

    let stats = stream.stats();
    assert!(stats.cancelled);
    // Rounds started at 0, 100 and 200ms; nothing after the cancel at 250ms
    assert_eq!(stats.attempted, 30);
    assert_eq!(peer.attempts(), 30);
    // The last round still runs to its timeout, never beyond
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(350), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_open_ports_reported_after_cancel() {
    let all_open: Vec<u16> = (1..=100).collect();
    let peer = Arc::new(SimulatedPeer::refusing(&all_open).with_open_delay(Duration::from_millis(80)));
    let engine = ScanEngine::with_connector(config(1, 100, 200, 5), Arc::clone(&peer)).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
    });

    let stream = engine.scan_with_cancel(cancel).await.unwrap();
    let mut found: Vec<u16> = stream.map(|r| r.port).collect().await;
    found.sort_unstable();

    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_dropping_stream_stops_dispatch() {
    let peer = Arc::new(SimulatedPeer::new(&[1], Closed::RefuseAfter(Duration::from_millis(20))));
    let engine = ScanEngine::with_connector(config(1, 10_000, 1000, 4), Arc::clone(&peer)).unwrap();

    let mut stream = engine.scan().await.unwrap();
    let first = stream.next().await.unwrap();
    assert_eq!(first.port, 1);
    drop(stream);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_drop = peer.attempts();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(after_drop < 10_000);
    assert_eq!(peer.attempts(), after_drop, "dispatch continued after the stream was dropped");
}
