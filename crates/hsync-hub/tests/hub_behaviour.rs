// End-to-end behaviour of the hub: exclusion, presence counts, duplicate
// identities, idempotent unregister and failure isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hsync_core::config::HubConfig;
use hsync_hub::{
    ChannelSink, Connection, Event, EventSink, Hub, HubError, ONLINE_COUNT_EVENT,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

struct Client {
    conn: Arc<Connection>,
    rx: mpsc::Receiver<Bytes>,
}

fn client(id: &str) -> Client {
    let (sink, rx) = ChannelSink::channel(32);
    let conn = Arc::new(Connection::new(id, Arc::new(sink), CancellationToken::new()));
    Client { conn, rx }
}

fn counter(n: usize) -> hsync_hub::Result<String> {
    Ok(format!("<span>{n} online</span>"))
}

fn spawn_hub() -> Hub {
    let (hub, _task) = Hub::spawn(&HubConfig::default(), counter);
    hub
}

/// Next frame whose event name is not the presence event.
async fn next_app_frame(rx: &mut mpsc::Receiver<Bytes>) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("sink closed");
        let text = String::from_utf8(frame.to_vec()).unwrap();
        if !text.starts_with(&format!("event: {ONLINE_COUNT_EVENT}\n")) {
            return text;
        }
    }
}

/// Next presence payload, e.g. `<span>2 online</span>`.
async fn next_count(rx: &mut mpsc::Receiver<Bytes>) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a count")
            .expect("sink closed");
        let text = String::from_utf8(frame.to_vec()).unwrap();
        if let Some(rest) = text.strip_prefix(&format!("event: {ONLINE_COUNT_EVENT}\ndata: ")) {
            return rest.trim_end().to_string();
        }
    }
}

fn drain_app_frames(rx: &mut mpsc::Receiver<Bytes>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        let text = String::from_utf8(frame.to_vec()).unwrap();
        if !text.starts_with(&format!("event: {ONLINE_COUNT_EVENT}\n")) {
            frames.push(text);
        }
    }
    frames
}

async fn wait_for_count(hub: &Hub, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while hub.online_count() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("online count never reached {expected}"));
}

#[tokio::test]
async fn broadcast_skips_excluded_originator() {
    let hub = spawn_hub();
    let mut a = client("a");
    let mut b = client("b");
    let mut c = client("c");
    hub.register(Arc::clone(&a.conn));
    hub.register(Arc::clone(&b.conn));
    hub.register(Arc::clone(&c.conn));

    hub.broadcast(Event::new("x", "hello\nworld").excluding("b"))
        .await
        .unwrap();

    let expected = "event: x\ndata: hello\ndata: world\n\n";
    assert_eq!(next_app_frame(&mut a.rx).await, expected);
    assert_eq!(next_app_frame(&mut c.rx).await, expected);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain_app_frames(&mut b.rx).is_empty(), "excluded client got the event");
    assert!(drain_app_frames(&mut a.rx).is_empty(), "event delivered twice");
    assert!(drain_app_frames(&mut c.rx).is_empty(), "event delivered twice");
}

#[tokio::test]
async fn online_count_follows_register_and_unregister() {
    let hub = spawn_hub();
    let mut a = client("a");
    let mut b = client("b");

    hub.register(Arc::clone(&a.conn));
    assert_eq!(next_count(&mut a.rx).await, "<span>1 online</span>");
    assert_eq!(hub.online_count(), 1);

    hub.register(Arc::clone(&b.conn));
    assert_eq!(next_count(&mut a.rx).await, "<span>2 online</span>");
    assert_eq!(next_count(&mut b.rx).await, "<span>2 online</span>");
    assert_eq!(hub.online_count(), 2);

    hub.unregister(Arc::clone(&a.conn));
    assert_eq!(next_count(&mut b.rx).await, "<span>1 online</span>");
    assert_eq!(hub.online_count(), 1);
}

#[tokio::test]
async fn duplicate_identity_replaces_and_closes_previous() {
    let hub = spawn_hub();
    let first = client("a");
    let mut second = client("a");

    hub.register(Arc::clone(&first.conn));
    hub.register(Arc::clone(&second.conn));
    wait_for_count(&hub, 1).await;

    // The count is still 1 after both registrations were processed.
    assert_eq!(next_count(&mut second.rx).await, "<span>1 online</span>");
    assert!(first.conn.is_done(), "superseded connection must be closed");
    assert!(!second.conn.is_done());

    // The late unregister from the first stream must not evict the second.
    hub.unregister(Arc::clone(&first.conn));
    let z = client("z");
    hub.register(Arc::clone(&z.conn));
    wait_for_count(&hub, 2).await;

    hub.broadcast(Event::new("ping", "p")).await.unwrap();
    assert_eq!(next_app_frame(&mut second.rx).await, "event: ping\ndata: p\n\n");
}

#[tokio::test]
async fn unregister_twice_is_a_no_op() {
    let hub = spawn_hub();
    let a = client("a");
    let b = client("b");
    hub.register(Arc::clone(&a.conn));
    hub.register(Arc::clone(&b.conn));

    hub.unregister(Arc::clone(&a.conn));
    hub.unregister(Arc::clone(&a.conn));

    // Control messages are applied in order, so once c is counted both
    // unregisters have been processed.
    let c = client("c");
    hub.register(Arc::clone(&c.conn));
    wait_for_count(&hub, 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(hub.online_count(), 2);
}

#[tokio::test]
async fn count_matches_distinct_identities() {
    let hub = spawn_hub();
    let clients: Vec<Client> = ["a", "b", "c", "a", "d", "b"]
        .iter()
        .map(|id| client(id))
        .collect();
    for c in &clients {
        hub.register(Arc::clone(&c.conn));
    }
    wait_for_count(&hub, 4).await;

    hub.unregister(Arc::clone(&clients[2].conn)); // c
    hub.unregister(Arc::clone(&clients[0].conn)); // superseded a: no-op
    let sentinel = client("s");
    hub.register(Arc::clone(&sentinel.conn));
    wait_for_count(&hub, 4).await;
}

struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn write_frame(&self, _frame: Bytes) -> hsync_hub::Result<()> {
        Err(HubError::ConnectionClosed)
    }
}

struct StalledSink;

#[async_trait]
impl EventSink for StalledSink {
    async fn write_frame(&self, _frame: Bytes) -> hsync_hub::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct PanickingSink;

#[async_trait]
impl EventSink for PanickingSink {
    async fn write_frame(&self, _frame: Bytes) -> hsync_hub::Result<()> {
        panic!("sink exploded");
    }
}

#[tokio::test]
async fn failing_and_stalled_clients_do_not_block_others() {
    let hub = spawn_hub();
    let failing = Arc::new(Connection::new(
        "failing",
        Arc::new(FailingSink),
        CancellationToken::new(),
    ));
    let stalled = Arc::new(Connection::new(
        "stalled",
        Arc::new(StalledSink),
        CancellationToken::new(),
    ));
    let panicking = Arc::new(Connection::new(
        "panicking",
        Arc::new(PanickingSink),
        CancellationToken::new(),
    ));
    let mut healthy = client("healthy");

    hub.register(Arc::clone(&failing));
    hub.register(Arc::clone(&stalled));
    hub.register(Arc::clone(&panicking));
    hub.register(Arc::clone(&healthy.conn));

    hub.broadcast(Event::new("x", "1")).await.unwrap();
    assert_eq!(next_app_frame(&mut healthy.rx).await, "event: x\ndata: 1\n\n");

    // Failed deliveries leave the registry alone and the loop keeps serving.
    hub.broadcast(Event::new("x", "2")).await.unwrap();
    assert_eq!(next_app_frame(&mut healthy.rx).await, "event: x\ndata: 2\n\n");
    assert_eq!(hub.online_count(), 4);

    // Closing the stalled connection releases its pending writes.
    stalled.close();
    hub.unregister(stalled);
    wait_for_count(&hub, 3).await;
}

#[tokio::test]
async fn closed_connection_is_skipped() {
    let hub = spawn_hub();
    let mut gone = client("gone");
    let mut live = client("live");
    hub.register(Arc::clone(&gone.conn));
    hub.register(Arc::clone(&live.conn));
    wait_for_count(&hub, 2).await;

    // Closed but not yet unregistered: the race the done signal covers.
    gone.conn.close();
    hub.broadcast(Event::new("x", "y")).await.unwrap();
    assert_eq!(next_app_frame(&mut live.rx).await, "event: x\ndata: y\n\n");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(drain_app_frames(&mut gone.rx).is_empty());
}

#[tokio::test]
async fn presence_render_failure_keeps_loop_running() {
    let renderer = |n: usize| -> hsync_hub::Result<String> {
        if n == 2 {
            Err(HubError::Render("template missing".into()))
        } else {
            Ok(n.to_string())
        }
    };
    let (hub, _task) = Hub::spawn(&HubConfig::default(), renderer);
    let mut a = client("a");
    hub.register(Arc::clone(&a.conn));
    hub.register(Arc::clone(&client("b").conn));
    hub.register(Arc::clone(&client("c").conn));

    assert_eq!(next_count(&mut a.rx).await, "1");
    // The count-2 notification was dropped; the next one still arrives.
    assert_eq!(next_count(&mut a.rx).await, "3");

    hub.broadcast(Event::new("x", "still alive")).await.unwrap();
    assert_eq!(
        next_app_frame(&mut a.rx).await,
        "event: x\ndata: still alive\n\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_client_sees_events_in_broadcast_order() {
    const EVENTS: usize = 2000;
    let hub = spawn_hub();
    let (sink, mut rx) = ChannelSink::channel(EVENTS + 16);
    let conn = Arc::new(Connection::new("ordered", Arc::new(sink), CancellationToken::new()));
    hub.register(Arc::clone(&conn));

    for i in 0..EVENTS {
        hub.broadcast(Event::new("seq", i.to_string())).await.unwrap();
    }

    for expected in 0..EVENTS {
        let frame = next_app_frame(&mut rx).await;
        assert_eq!(frame, format!("event: seq\ndata: {expected}\n\n"));
    }
}
