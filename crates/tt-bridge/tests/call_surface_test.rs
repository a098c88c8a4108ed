//! The same call-surface scenarios against both transports: the network
//! client talking to a live router, and the in-process bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tt_api_types::{
    AppMode, AuthMethod, ConnectionConfig, ConnectionState, LastConnection, NotificationKind,
};
use tt_bridge::http_api::{api_router, ApiState};
use tt_bridge::remote::OpenSshConnector;
use tt_bridge::InProcessBridge;
use tt_client::{
    CallSurface, CallSurfaceExt, HostEnvironment, HttpTransport, StreamState, TransportKind,
    TransportResolver,
};
use tt_core::config::Config;
use tt_core::config_store::ConfigStore;

fn build_state(dir: &tempfile::TempDir) -> Arc<ApiState> {
    let store = Arc::new(ConfigStore::with_config(
        dir.path().join("config.toml"),
        Config::default(),
    ));
    let connector = Arc::new(OpenSshConnector::with_runtime_dir(
        "/nonexistent/tether-test-ssh",
        dir.path(),
    ));
    Arc::new(ApiState::new(store, connector))
}

async fn serve(state: Arc<ApiState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();
    let router = api_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn http_surface(state: Arc<ApiState>) -> HttpTransport {
    let base = serve(state.clone()).await;
    let transport = HttpTransport::new(&base).unwrap();
    let mut stream_state = transport.watch_stream_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        stream_state.wait_for(|s| *s == StreamState::Connected),
    )
    .await
    .expect("event stream connected")
    .unwrap();
    wait_for_hub(&state, 1).await;
    transport
}

async fn wait_for_hub(state: &ApiState, connections: usize) {
    for _ in 0..200 {
        if state.hub.connection_count() >= connections {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {connections} connection(s)");
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event delivered in time")
        .expect("listener still registered")
}

fn agent_config(host: &str) -> ConnectionConfig {
    ConnectionConfig {
        host: host.into(),
        port: 22,
        username: "ci".into(),
        auth_method: AuthMethod::Agent,
        private_key_path: None,
        password: None,
    }
}

// ---------------------------------------------------------------------------
// Shared scenarios
// ---------------------------------------------------------------------------

async fn notifications_scenario(api: &dyn CallSurface, state: &ApiState) {
    assert_eq!(api.unread_notification_count().await, 0);
    let first = state.notifications.add(NotificationKind::Info, "one", "a");
    state.notifications.add(NotificationKind::Warning, "two", "b");

    let page = api.get_notifications(Some(1), None).await;
    assert_eq!(page.notifications.len(), 1);
    assert_eq!(page.notifications[0].title, "two");
    assert!(page.has_more);

    assert!(api.mark_notification_read(&first.id).await);
    assert!(!api.mark_notification_read("missing").await);
    assert!(!api.mark_notification_read("bad id!").await);
    assert_eq!(api.unread_notification_count().await, 1);

    assert!(api.delete_notification(&first.id).await);
    assert!(api.mark_all_notifications_read().await);
    assert!(api.clear_notifications().await);
    assert_eq!(api.get_notifications(None, None).await.total, 0);
}

async fn remote_scenario(api: &dyn CallSurface) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = api.on_connection_status(move |s| {
        let _ = tx.send(s);
    });

    let err = api.remote_connect(agent_config("build-box")).await.unwrap_err();
    assert!(err.to_string().contains("failed to start"));

    assert_eq!(next(&mut rx).await.state, ConnectionState::Connecting);
    let failed = next(&mut rx).await;
    assert_eq!(failed.state, ConnectionState::Error);
    assert_eq!(api.remote_status().await.state, ConnectionState::Error);

    let outcome = api.remote_test(agent_config("build-box")).await.unwrap();
    assert!(!outcome.success);

    let status = api.remote_disconnect().await.unwrap();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(next(&mut rx).await.state, ConnectionState::Disconnected);
    assert_eq!(api.get_mode().await, AppMode::Local);

    assert!(api.last_connection().await.is_none());
    let last = LastConnection::from(&agent_config("build-box"));
    assert!(api.save_last_connection(last.clone()).await);
    assert_eq!(api.last_connection().await, Some(last));

    assert!(api.remote_resolve_host("no-such-alias").await.is_none());
}

async fn shell_scenario(api: &dyn CallSurface, state: &ApiState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = api.on_zoom_factor_changed(move |z| {
        let _ = tx.send(z);
    });

    state.shell.set_zoom_factor(1.75);
    assert_eq!(next(&mut rx).await, 1.75);
    assert_eq!(api.get_zoom_factor().await, 1.75);

    sub.unsubscribe();
    state.shell.set_zoom_factor(2.0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

async fn misc_scenario(api: &dyn CallSurface, project: &std::path::Path) {
    std::fs::write(project.join("notes.md"), "x").unwrap();
    let project = project.display().to_string();

    let found = api.validate_path("notes.md", &project).await;
    assert!(found.exists);
    assert_eq!(found.is_directory, Some(false));
    assert!(!api.validate_path("../../etc/passwd", &project).await.exists);

    let scroll = api.scroll_to_line("s-9", 12).await;
    assert!(scroll.success);
    assert_eq!(scroll.line_number, 12);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = api.on_update_status(move |e| {
        let _ = tx.send(e.status);
    });
    api.check_for_updates().await.unwrap();
    assert!(api.download_update().await.is_err());
    assert!(api.install_update().await.is_err());
    assert_eq!(
        serde_json::to_value(next(&mut rx).await).unwrap(),
        serde_json::json!("checking")
    );
}

// ===========================================================================
// Network transport
// ===========================================================================

#[tokio::test]
async fn test_http_transport_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = http_surface(state.clone()).await;
    assert_eq!(api.kind(), TransportKind::Http);
    notifications_scenario(&api, &state).await;
}

#[tokio::test]
async fn test_http_transport_remote() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = http_surface(state.clone()).await;
    remote_scenario(&api).await;
}

#[tokio::test]
async fn test_http_transport_shell_events() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = http_surface(state.clone()).await;
    shell_scenario(&api, &state).await;
}

#[tokio::test]
async fn test_http_transport_validation_and_updater() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = http_surface(state.clone()).await;
    misc_scenario(&api, dir.path()).await;
}

// ===========================================================================
// In-process bridge
// ===========================================================================

#[tokio::test]
async fn test_in_process_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = InProcessBridge::new(state.clone());
    assert_eq!(api.kind(), TransportKind::InProcess);
    notifications_scenario(&api, &state).await;
}

#[tokio::test]
async fn test_in_process_remote() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = InProcessBridge::new(state.clone());
    wait_for_hub(&state, 1).await;
    remote_scenario(&api).await;
}

#[tokio::test]
async fn test_in_process_shell_events() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = InProcessBridge::new(state.clone());
    wait_for_hub(&state, 1).await;
    shell_scenario(&api, &state).await;
}

#[tokio::test]
async fn test_in_process_validation_and_updater() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = InProcessBridge::new(state.clone());
    wait_for_hub(&state, 1).await;
    misc_scenario(&api, dir.path()).await;
}

#[tokio::test]
async fn test_dropping_bridge_detaches_from_hub() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let api = InProcessBridge::new(state.clone());
    wait_for_hub(&state, 1).await;

    drop(api);
    for _ in 0..200 {
        if state.hub.connection_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.hub.connection_count(), 0);
}

// ===========================================================================
// Resolver
// ===========================================================================

#[tokio::test]
async fn test_embedded_resolver_uses_in_process_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&dir);
    let bridge: Arc<dyn CallSurface> = Arc::new(InProcessBridge::new(state));

    let resolver = TransportResolver::new(HostEnvironment::embedded(bridge));
    assert!(resolver.is_embedded());
    assert_eq!(resolver.resolve().kind(), TransportKind::InProcess);
}
