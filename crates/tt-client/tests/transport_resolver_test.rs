use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tt_client::resolver::TransportFactory;
use tt_client::{
    Api, CallSurface, HostEnvironment, HttpTransport, TransportKind, TransportResolver,
};

/// Factory that counts constructions and records the requested port.
fn counting_factory() -> (Arc<AtomicUsize>, Arc<AtomicUsize>, TransportFactory) {
    let built = Arc::new(AtomicUsize::new(0));
    let last_port = Arc::new(AtomicUsize::new(0));
    let b = built.clone();
    let p = last_port.clone();
    let factory: TransportFactory = Box::new(move |port| {
        b.fetch_add(1, Ordering::SeqCst);
        p.store(port as usize, Ordering::SeqCst);
        Arc::new(HttpTransport::for_port(port).expect("valid base url"))
    });
    (built, last_port, factory)
}

#[tokio::test]
async fn test_http_transport_built_once_and_cached() {
    let (built, port, factory) = counting_factory();
    let resolver = TransportResolver::with_factory(HostEnvironment::browser("port=4711"), factory);

    assert!(!resolver.is_embedded());
    assert!(!resolver.is_initialized());

    let first = resolver.resolve();
    let second = resolver.resolve();
    let third = resolver.resolve();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(port.load(Ordering::SeqCst), 4711);
    assert_eq!(first.kind(), TransportKind::Http);
}

#[tokio::test]
async fn test_missing_port_uses_default() {
    let (_built, port, factory) = counting_factory();
    let resolver = TransportResolver::with_factory(HostEnvironment::browser(""), factory);
    let _ = resolver.resolve();
    assert_eq!(port.load(Ordering::SeqCst), 3456);
}

#[tokio::test]
async fn test_bridge_is_returned_without_building_transport() {
    let bridge: Arc<dyn CallSurface> = Arc::new(HttpTransport::for_port(1).unwrap());
    let (built, _port, factory) = counting_factory();
    let resolver =
        TransportResolver::with_factory(HostEnvironment::embedded(bridge.clone()), factory);

    assert!(resolver.is_embedded());
    assert!(Arc::ptr_eq(&resolver.resolve(), &bridge));
    assert!(Arc::ptr_eq(&resolver.resolve(), &bridge));
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert!(!resolver.is_initialized());
}

#[tokio::test]
async fn test_api_handles_share_one_transport() {
    let (built, _port, factory) = counting_factory();
    let resolver = Arc::new(TransportResolver::with_factory(
        HostEnvironment::browser("port=1"),
        factory,
    ));

    let api = Api::new(resolver.clone());
    let cloned = api.clone();

    // Nothing is built until a call is made.
    assert_eq!(built.load(Ordering::SeqCst), 0);

    // Port 1 refuses connections, so calls degrade to safe defaults.
    assert_eq!(api.unread_notification_count().await, 0);
    assert_eq!(cloned.unread_notification_count().await, 0);
    assert!(cloned.remote_config_hosts().await.is_empty());

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(api.kind(), TransportKind::Http);
}
