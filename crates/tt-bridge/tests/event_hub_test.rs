//! Broadcast hub behaviour: fan-out, pruning, keepalive cadence and
//! unsubscribe semantics.

use std::time::Duration;

use serde_json::json;
use tt_bridge::event_hub::{EventHub, Frame};

fn drain(rx: &flume::Receiver<Frame>) -> Vec<Frame> {
    rx.try_iter().collect()
}

// ===========================================================================
// Publish
// ===========================================================================

#[tokio::test]
async fn test_publish_writes_to_every_open_connection() {
    let hub = EventHub::new();
    let a = hub.subscribe();
    let b = hub.subscribe();

    let written = hub.publish("notification:new", &json!({"id": "n1"}));
    assert_eq!(written, 2);

    for conn in [&a, &b] {
        let frame = conn.try_recv().expect("frame delivered");
        assert_eq!(frame.encode(), "event: notification:new\ndata: {\"id\":\"n1\"}\n\n");
    }
}

#[tokio::test]
async fn test_publish_prunes_connection_whose_write_fails() {
    let hub = EventHub::new();
    let a = hub.subscribe();
    let b = hub.subscribe();
    let (dead_id, dead_rx) = hub.subscribe().into_parts();
    drop(dead_rx);
    assert_eq!(hub.connection_count(), 3);

    let written = hub.publish("ssh:status", &json!({"state": "connecting"}));

    assert_eq!(written, 2);
    assert_eq!(hub.connection_count(), 2);
    assert!(!hub.is_subscribed(dead_id));
    assert!(a.try_recv().is_some());
    assert!(b.try_recv().is_some());
}

#[tokio::test]
async fn test_late_subscriber_sees_no_earlier_events() {
    let hub = EventHub::new();
    let early = hub.subscribe();
    hub.publish("mode:changed", &"ssh");

    let late = hub.subscribe();
    assert!(late.try_recv().is_none());
    assert!(early.try_recv().is_some());

    hub.publish("mode:changed", &"local");
    assert_eq!(
        late.try_recv().map(|f| f.encode()).as_deref(),
        Some("event: mode:changed\ndata: \"local\"\n\n")
    );
}

#[tokio::test]
async fn test_events_arrive_in_publish_order() {
    let hub = EventHub::new();
    let conn = hub.subscribe();
    for n in 0..5 {
        hub.publish("zoom-factor-changed", &n);
    }
    let data: Vec<String> = std::iter::from_fn(|| conn.try_recv())
        .map(|f| match f {
            Frame::Event { data, .. } => data.to_string(),
            Frame::KeepAlive => "ping".to_string(),
        })
        .collect();
    assert_eq!(data, vec!["0", "1", "2", "3", "4"]);
}

// ===========================================================================
// Unsubscribe
// ===========================================================================

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let hub = EventHub::new();
    let (id, _rx) = hub.subscribe().into_parts();

    assert!(hub.unsubscribe(id));
    assert!(!hub.unsubscribe(id));
    assert!(!hub.unsubscribe(id));
    assert_eq!(hub.connection_count(), 0);
}

#[tokio::test]
async fn test_close_then_publish_skips_connection() {
    let hub = EventHub::new();
    let keep = hub.subscribe();
    hub.subscribe().close();

    assert_eq!(hub.publish("notification:updated", &json!({"total": 0})), 1);
    assert!(keep.try_recv().is_some());
}

// ===========================================================================
// Keepalive
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_keepalive_pings_once_per_interval() {
    let period = Duration::from_secs(30);
    let hub = EventHub::with_keepalive(period);
    let (id, rx) = hub.subscribe().into_parts();

    // Nothing before the first full interval.
    tokio::time::sleep(period / 2).await;
    assert!(drain(&rx).is_empty());

    tokio::time::sleep(period * 3).await;
    let frames = drain(&rx);
    assert_eq!(frames, vec![Frame::KeepAlive; 3]);
    assert!(frames.iter().all(|f| f.encode() == ":ping\n\n"));

    hub.unsubscribe(id);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_stops_after_unsubscribe() {
    let period = Duration::from_secs(30);
    let hub = EventHub::with_keepalive(period);
    let (id, rx) = hub.subscribe().into_parts();

    tokio::time::sleep(period + period / 2).await;
    assert_eq!(drain(&rx).len(), 1);

    hub.unsubscribe(id);
    tokio::time::sleep(period * 4).await;
    assert!(drain(&rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_prunes_vanished_client() {
    let period = Duration::from_secs(30);
    let hub = EventHub::with_keepalive(period);
    let (id, rx) = hub.subscribe().into_parts();
    drop(rx);

    tokio::time::sleep(period + period / 2).await;
    assert!(!hub.is_subscribed(id));
    assert_eq!(hub.connection_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_interleaves_with_events() {
    let period = Duration::from_secs(30);
    let hub = EventHub::with_keepalive(period);
    let conn = hub.subscribe();

    hub.publish("ssh:status", &json!({"state": "connected"}));
    tokio::time::sleep(period + period / 2).await;
    hub.publish("ssh:status", &json!({"state": "disconnected"}));

    let kinds: Vec<&str> = std::iter::from_fn(|| conn.try_recv())
        .map(|f| match f {
            Frame::Event { .. } => "event",
            Frame::KeepAlive => "ping",
        })
        .collect();
    assert_eq!(kinds, vec!["event", "ping", "event"]);
}
