//! Failover behaviour against real loopback TCP targets.

use std::sync::Arc;
use std::time::Duration;

use dualconn::failover::ProbeOutcome;
use dualconn::net::{dialer_fn, Dialer, TcpDialer};
use dualconn::{Connection, DialError, FailoverConfig, Manager, ManagerError};
use tokio::io::AsyncReadExt;

mod common;
use common::{refused_addr, roundtrip, EchoServer};

/// Manager whose background pass never fires during a test.
fn manager(targets: &[String], failback: bool) -> Manager {
    let config = FailoverConfig {
        dial_timeout_ms: 1_000,
        maintenance_interval_ms: 3_600_000,
        failback,
        ..FailoverConfig::new(targets.iter().cloned())
    };
    Manager::new(config, Arc::new(TcpDialer::new())).unwrap()
}

#[tokio::test]
async fn primary_preferred_when_up() {
    let primary = EchoServer::start("primary").await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[primary.addr.to_string(), replica.addr.to_string()], false);

    let mut conn = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut conn, "ping").await, "primary:ping");
    assert_eq!(replica.accepted(), 0);

    let stats = conn.stats();
    assert_eq!(stats.bytes_written, 4);
    assert_eq!(stats.bytes_read, "primary:ping".len() as u64);
    assert!(stats.last_read.is_some() && stats.last_write.is_some());

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn falls_over_to_next_target() {
    let down = refused_addr().await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[down.to_string(), replica.addr.to_string()], false);

    let mut conn = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut conn, "hello").await, "replica:hello");

    let snapshot = manager.snapshot();
    assert!(snapshot.targets[0].last_dial_error.is_some());
    assert!(snapshot.targets[0].last_dial_time.is_some());
    assert!(snapshot.targets[0].connections.is_empty());
    assert_eq!(snapshot.targets[1].open_connections(), 1);
    assert!(snapshot.targets[1].last_dial_error.is_none());

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn unavailable_when_every_target_refuses() {
    let a = refused_addr().await;
    let b = refused_addr().await;
    let manager = manager(&[a.to_string(), b.to_string()], false);

    assert_eq!(manager.connect().await.unwrap_err(), DialError::Unavailable);
    for target in manager.snapshot().targets {
        assert!(target.last_dial_error.is_some(), "{} has no recorded error", target.address);
    }

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn probe_fails_back_to_recovered_primary() {
    let primary_addr = refused_addr().await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[primary_addr.to_string(), replica.addr.to_string()], true);

    let mut on_replica = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut on_replica, "a").await, "replica:a");

    let report = manager.run_maintenance().await;
    assert!(matches!(report.probe, ProbeOutcome::Unreachable { .. }));
    assert!(!on_replica.is_closed());

    let primary = EchoServer::start_on(primary_addr, "primary").await;
    let report = manager.run_maintenance().await;
    assert_eq!(report.probe, ProbeOutcome::Healthy { failback_closed: 1 });
    assert!(on_replica.is_closed());

    let mut buf = [0u8; 8];
    assert!(on_replica.read(&mut buf).await.is_err());

    let mut on_primary = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut on_primary, "b").await, "primary:b");
    // One probe plus one real connection.
    assert_eq!(primary.accepted(), 2);

    // The closed replica entry goes on the next pass.
    let report = manager.run_maintenance().await;
    assert_eq!(report.recycled, 1);
    assert!(manager.target(1).unwrap().connections.is_empty());

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn dial_to_primary_fails_back() {
    let primary_addr = refused_addr().await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[primary_addr.to_string(), replica.addr.to_string()], true);

    let on_replica = manager.connect().await.unwrap();
    let _primary = EchoServer::start_on(primary_addr, "primary").await;

    let _on_primary = manager.connect().await.unwrap();
    assert!(on_replica.is_closed());
    assert_eq!(manager.target(0).unwrap().open_connections(), 1);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn no_failback_leaves_secondaries_alone() {
    let primary_addr = refused_addr().await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[primary_addr.to_string(), replica.addr.to_string()], false);

    let mut on_replica = manager.connect().await.unwrap();
    let _primary = EchoServer::start_on(primary_addr, "primary").await;

    let report = manager.run_maintenance().await;
    assert_eq!(report.probe, ProbeOutcome::Healthy { failback_closed: 0 });
    assert_eq!(roundtrip(&mut on_replica, "still").await, "replica:still");

    // New dials still prefer the primary.
    let mut fresh = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut fresh, "x").await, "primary:x");
    assert!(!on_replica.is_closed());

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn disabled_primary_is_skipped() {
    let primary = EchoServer::start("primary").await;
    let replica = EchoServer::start("replica").await;
    let manager = manager(&[primary.addr.to_string(), replica.addr.to_string()], true);

    let on_primary = manager.connect().await.unwrap();
    assert!(manager.set_disabled(&primary.addr.to_string(), true));
    assert!(on_primary.is_closed());

    let mut next = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut next, "d").await, "replica:d");

    let report = manager.run_maintenance().await;
    assert_eq!(report.probe, ProbeOutcome::Skipped);
    assert_eq!(report.recycled, 1);
    assert!(!next.is_closed());

    assert!(manager.set_disabled(&primary.addr.to_string(), false));
    assert!(!manager.set_disabled("127.0.0.1:1", false));

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn detached_and_closed_connections_are_recycled() {
    let primary = EchoServer::start("primary").await;
    let manager = manager(&[primary.addr.to_string()], false);

    let mut conn = manager.connect().await.unwrap();
    let mut raw = dualconn::unwrap(Box::new(manager.connect().await.unwrap()));
    assert!(raw.as_any().is::<tokio::net::TcpStream>());

    // Detaching the raw stream leaves the manager's entry closed.
    assert_eq!(roundtrip(&mut raw, "raw").await, "primary:raw");
    conn.close().await.unwrap();

    let report = manager.run_maintenance().await;
    assert_eq!(report.recycled, 2);
    assert_eq!(manager.target(0).unwrap().connections.len(), 0);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn close_is_once_only() {
    let primary = EchoServer::start("primary").await;
    let manager = manager(&[primary.addr.to_string()], false);

    let conn = manager.connect().await.unwrap();
    manager.close().unwrap();
    assert!(conn.is_closed());
    assert_eq!(manager.close().unwrap_err(), ManagerError::AlreadyClosed);
    assert_eq!(manager.connect().await.unwrap_err(), DialError::Closed);
    assert!(manager.snapshot().closed);
}

#[tokio::test]
async fn dial_timeout_moves_on() {
    // Every address except the replica hangs forever.
    let replica = EchoServer::start("replica").await;
    let replica_addr = replica.addr.to_string();
    let dialer = dialer_fn(move |network, address| {
        let replica_addr = replica_addr.clone();
        async move {
            if address != replica_addr {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            TcpDialer::new().dial(network, &address).await
        }
    });
    let config = FailoverConfig {
        dial_timeout_ms: 50,
        maintenance_interval_ms: 3_600_000,
        ..FailoverConfig::new(vec!["10.255.255.1:9".to_string(), replica.addr.to_string()])
    };
    let manager = Manager::new(config, Arc::new(dialer)).unwrap();

    let mut conn = manager.connect().await.unwrap();
    assert_eq!(roundtrip(&mut conn, "t").await, "replica:t");
    let primary = manager.target(0).unwrap();
    assert!(primary.last_dial_error.unwrap().contains("timed out"));

    manager.shutdown().await.unwrap();
}
