//! Daemon lifecycle: serve on an ephemeral port, answer requests, and shut
//! down cleanly even with event streams attached.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use tt_api_types::AppMode;
use tt_core::config::Config;
use tt_core::config_store::ConfigStore;
use tt_daemon::daemon::Daemon;

fn daemon(dir: &tempfile::TempDir) -> Daemon {
    let mut config = Config::default();
    config.remote.ssh_binary = "/nonexistent/tether-test-ssh".into();
    let store = Arc::new(ConfigStore::with_config(dir.path().join("config.toml"), config));
    Daemon::new(store)
}

#[tokio::test]
async fn test_serves_health_and_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = Arc::new(daemon(&dir));
    let shutdown = daemon.shutdown_handle();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let runner = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.run_with_listener(listener).await })
    };

    let health: Value = reqwest::get(format!("{base}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("daemon stopped in time")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(daemon.api_state().shell.mode(), AppMode::Local);
}

#[tokio::test]
async fn test_shutdown_ends_open_event_streams() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = Arc::new(daemon(&dir));
    let shutdown = daemon.shutdown_handle();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let runner = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.run_with_listener(listener).await })
    };

    let stream = reqwest::get(format!("{base}/api/events")).await.unwrap();
    assert_eq!(stream.status(), 200);
    for _ in 0..200 {
        if daemon.api_state().hub.connection_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(daemon.api_state().hub.connection_count(), 1);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("graceful shutdown did not hang on the event stream")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(daemon.api_state().hub.connection_count(), 0);

    // The body ends instead of hanging.
    let rest = tokio::time::timeout(Duration::from_secs(5), stream.bytes()).await;
    assert!(rest.is_ok());
}

#[test]
fn test_bind_addr_uses_config_and_override() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = daemon(&dir);
    assert_eq!(daemon.bind_addr().unwrap().to_string(), "127.0.0.1:3456");

    let daemon = daemon.with_port(4010);
    assert_eq!(daemon.bind_addr().unwrap().to_string(), "127.0.0.1:4010");
}

#[test]
fn test_bind_addr_rejects_bad_host() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.server.host = "not a host".into();
    let store = Arc::new(ConfigStore::with_config(dir.path().join("config.toml"), config));

    assert!(Daemon::new(store).bind_addr().is_err());
}
