//! Probe behavior against live sockets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_manager::health::{CheckResult, Checker, CheckerPool, HealthJob};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

mod common;

use common::{closed_addr, MockBackend};

fn checker() -> Checker {
    Checker::new(Duration::from_millis(500), "gateway-manager-test").unwrap()
}

#[tokio::test]
async fn test_probe_status_200_is_alive() {
    let backend = MockBackend::start(200).await;
    assert!(checker().probe(&backend.health_url()).await);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_probe_non_200_is_dead() {
    let backend = MockBackend::start(500).await;
    assert!(!checker().probe(&backend.health_url()).await);

    backend.set_status(503);
    assert!(!checker().probe(&backend.health_url()).await);
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_probe_refused_connection_is_dead() {
    let addr = closed_addr().await;
    assert!(!checker().probe(&format!("http://{}/health", addr)).await);
}

#[tokio::test]
async fn test_probe_timeout_is_dead() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let checker = Checker::new(Duration::from_millis(100), "gateway-manager-test").unwrap();
    let started = Instant::now();
    assert!(!checker.probe(&format!("http://{}/health", addr)).await);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_https_target_opens_tls_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (hello_tx, hello_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut header = [0u8; 3];
        socket.read_exact(&mut header).await.unwrap();
        let _ = hello_tx.send(header);
    });

    let t0 = Instant::now();
    let url = format!("https://{}/health", addr);
    let job = HealthJob::new("/clusters/c1/tls", url, Duration::from_secs(10), t0);
    let (tx, mut rx) = mpsc::channel(1);

    // The handshake cannot complete, so the target is dead, but a TLS
    // ClientHello (record type 0x16, version 3.x) must have been sent.
    assert!(checker().check(&job, t0 + Duration::from_secs(10), &tx).await);
    assert_eq!(
        rx.recv().await,
        Some(CheckResult { instance_key: "/clusters/c1/tls".to_string(), is_alive: false })
    );
    let header = tokio::time::timeout(Duration::from_secs(2), hello_rx).await.unwrap().unwrap();
    assert_eq!(header[0], 0x16);
    assert_eq!(header[1], 0x03);
}

#[tokio::test]
async fn test_check_reports_once_per_slot() {
    let backend = MockBackend::start(200).await;
    let t0 = Instant::now();
    let job = HealthJob::new("/clusters/c1/i1", backend.health_url(), Duration::from_secs(10), t0);
    let (tx, mut rx) = mpsc::channel(4);
    let checker = checker();

    let due = t0 + Duration::from_secs(10);
    assert!(checker.check(&job, due, &tx).await);
    assert!(!checker.check(&job, due, &tx).await);

    assert_eq!(
        rx.recv().await,
        Some(CheckResult { instance_key: "/clusters/c1/i1".to_string(), is_alive: true })
    );
    assert!(rx.try_recv().is_err());
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_pooled_checkers_probe_concurrently() {
    let backend = MockBackend::start(200).await;
    let pool = Arc::new(
        CheckerPool::new(2, 2, Checker::factory(Duration::from_millis(500), "gateway-manager-test")).unwrap(),
    );

    let mut probes = Vec::new();
    for _ in 0..4 {
        let checker = pool.acquire_scoped().unwrap();
        let url = backend.health_url();
        probes.push(tokio::spawn(async move { checker.probe(&url).await }));
    }
    for probe in probes {
        assert!(probe.await.unwrap());
    }

    assert_eq!(backend.hits(), 4);
    assert_eq!(pool.len(), 2);
}
