mod common;

use std::time::{Duration, Instant};

use impact_portal::config::ConnectionSettings;
use impact_portal::{ConnectionHandle, ConnectionManager, UnreachableReason};
use tokio::net::TcpListener;

#[tokio::test]
async fn missing_socket_is_network_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::test_config(common::missing_socket(dir.path()));
    let manager = ConnectionManager::new(&cfg);

    let started = Instant::now();
    let handle = manager.probe().await;
    assert_eq!(handle.reason(), Some(UnreachableReason::NetworkUnavailable));
    assert!(started.elapsed() <= manager.connect_timeout() + Duration::from_millis(500));
}

#[tokio::test]
async fn refused_tcp_port_is_network_unavailable_within_timeout() {
    // Reserve a free port, then close it so connects are refused.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let cfg = common::test_config(common::tcp("127.0.0.1", port, Duration::from_secs(2)));
    let manager = ConnectionManager::new(&cfg);

    let started = Instant::now();
    let handle = manager.probe().await;
    let elapsed = started.elapsed();

    assert_eq!(handle.reason(), Some(UnreachableReason::NetworkUnavailable));
    assert!(elapsed <= Duration::from_millis(2500), "probe took {elapsed:?}");
}

#[tokio::test]
async fn silent_server_times_out_within_bound() {
    // Accepts TCP connections and never answers the startup handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let cfg = common::test_config(common::tcp("127.0.0.1", port, Duration::from_secs(1)));
    let manager = ConnectionManager::new(&cfg);

    let started = Instant::now();
    let handle = manager.probe().await;
    let elapsed = started.elapsed();

    assert_eq!(handle.reason(), Some(UnreachableReason::Timeout));
    assert!(elapsed >= Duration::from_millis(900), "returned early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1500), "probe took {elapsed:?}");

    server.abort();
}

#[tokio::test]
async fn handle_probes_once_per_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::test_config(common::missing_socket(dir.path()));
    let manager = ConnectionManager::new(&cfg);

    let mut handle = ConnectionHandle::default();
    assert!(matches!(handle, ConnectionHandle::Unresolved));

    let first = handle.acquire(&manager).await.err();
    assert_eq!(first, Some(UnreachableReason::NetworkUnavailable));
    assert!(!handle.is_connected());

    // Second acquire in the same request reuses the outcome.
    let second = handle.acquire(&manager).await.err();
    assert_eq!(second, first);

    handle.release().await;
}

#[tokio::test]
async fn each_request_gets_a_fresh_probe() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::test_config(common::missing_socket(dir.path()));
    let manager = ConnectionManager::new(&cfg);

    for _ in 0..2 {
        let mut handle = ConnectionHandle::default();
        assert_eq!(
            handle.acquire(&manager).await.err(),
            Some(UnreachableReason::NetworkUnavailable)
        );
        handle.release().await;
    }
}

/// Needs a reachable Postgres:
/// `PORTAL_TEST_DB_HOST`, `PORTAL_TEST_DB_PORT`, `PORTAL_TEST_DB_USER`,
/// `PORTAL_TEST_DB_PASS`, `PORTAL_TEST_DB_NAME`.
#[tokio::test]
#[ignore]
async fn reachable_database_is_connected() {
    let var = |k: &str| std::env::var(k).unwrap_or_else(|_| panic!("{k} must be set"));
    let mut cfg = common::test_config(ConnectionSettings {
        host: Some(var("PORTAL_TEST_DB_HOST")),
        port: var("PORTAL_TEST_DB_PORT").parse().expect("port"),
        ..ConnectionSettings::default()
    });
    cfg.db_user = var("PORTAL_TEST_DB_USER");
    cfg.db_password = var("PORTAL_TEST_DB_PASS");
    cfg.db_name = var("PORTAL_TEST_DB_NAME");

    let manager = ConnectionManager::new(&cfg);
    let mut handle = manager.probe().await;
    assert!(handle.is_connected(), "probe failed: {handle:?}");

    let conn = handle.acquire(&manager).await.expect("connected");
    let (one,): (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(&mut *conn)
        .await
        .expect("query");
    assert_eq!(one, 1);
    handle.release().await;
}
