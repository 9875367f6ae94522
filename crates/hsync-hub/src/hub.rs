use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use hsync_core::config::{HubConfig, QueuePolicy};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{Connection, Delivery};
use crate::error::{HubError, Result};
use crate::event::{Event, ONLINE_COUNT_EVENT};
use crate::presence::PresenceRenderer;

enum Control {
    Register(Arc<Connection>),
    Unregister(Arc<Connection>),
}

/// Handle to the coordinator task. Cheap to clone; the task stops once every
/// handle is dropped.
#[derive(Clone)]
pub struct Hub {
    control_tx: mpsc::UnboundedSender<Control>,
    event_tx: mpsc::Sender<Event>,
    online: Arc<AtomicUsize>,
    policy: QueuePolicy,
    capacity: usize,
}

impl Hub {
    /// Start the coordinator on the current tokio runtime.
    pub fn spawn<R>(config: &HubConfig, renderer: R) -> (Self, JoinHandle<()>)
    where
        R: PresenceRenderer + 'static,
    {
        let capacity = config.queue_capacity.max(1);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let online = Arc::new(AtomicUsize::new(0));

        let coordinator = Coordinator {
            registry: HashMap::new(),
            online: Arc::clone(&online),
            renderer: Box::new(renderer),
            control_rx,
            event_rx,
        };
        let task = tokio::spawn(coordinator.run());

        let hub = Self {
            control_tx,
            event_tx,
            online,
            policy: config.full_policy,
            capacity,
        };
        (hub, task)
    }

    /// Add `conn` to the registry. Never blocks, so it is safe to call from
    /// synchronous code.
    pub fn register(&self, conn: Arc<Connection>) {
        if self.control_tx.send(Control::Register(conn)).is_err() {
            warn!("register after hub stopped");
        }
    }

    /// Remove `conn` if it is still the registered entry for its identity.
    /// Silent no-op otherwise. Safe to call from `Drop`.
    pub fn unregister(&self, conn: Arc<Connection>) {
        if self.control_tx.send(Control::Unregister(conn)).is_err() {
            debug!("unregister after hub stopped");
        }
    }

    /// Queue `event` for fan-out.
    ///
    /// With [`QueuePolicy::Block`] a full queue makes the caller wait; with
    /// [`QueuePolicy::Reject`] it returns [`HubError::QueueFull`].
    pub async fn broadcast(&self, event: Event) -> Result<()> {
        match self.policy {
            QueuePolicy::Block => self
                .event_tx
                .send(event)
                .await
                .map_err(|_| HubError::HubStopped),
            QueuePolicy::Reject => self.event_tx.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => HubError::QueueFull {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => HubError::HubStopped,
            }),
        }
    }

    /// Number of registered connections as of the last processed message.
    pub fn online_count(&self) -> usize {
        self.online.load(Ordering::Acquire)
    }
}

/// One frame queued for a connection's writer.
struct Outgoing {
    frame: Bytes,
    event: Arc<str>,
}

/// Registry entry: the connection plus the ordered queue its writer drains.
struct Peer {
    conn: Arc<Connection>,
    outbox: mpsc::UnboundedSender<Outgoing>,
}

/// Owns the registry. Runs on its own task and never performs I/O.
struct Coordinator {
    registry: HashMap<String, Peer>,
    online: Arc<AtomicUsize>,
    renderer: Box<dyn PresenceRenderer>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    event_rx: mpsc::Receiver<Event>,
}

impl Coordinator {
    async fn run(mut self) {
        info!("hub started");
        loop {
            // Control first: a register issued before a broadcast is applied
            // before that broadcast is dispatched.
            tokio::select! {
                biased;
                msg = self.control_rx.recv() => match msg {
                    Some(Control::Register(conn)) => self.register(conn),
                    Some(Control::Unregister(conn)) => self.unregister(conn),
                    None => break,
                },
                event = self.event_rx.recv() => match event {
                    Some(event) => self.dispatch(&event),
                    None => break,
                },
            }
        }
        info!(online = self.registry.len(), "hub stopped");
    }

    fn register(&mut self, conn: Arc<Connection>) {
        if conn.id().is_empty() {
            warn!("ignoring registration with empty identity");
            return;
        }

        let id = conn.id().to_string();
        let already_registered = self
            .registry
            .get(&id)
            .is_some_and(|peer| Arc::ptr_eq(&peer.conn, &conn));
        if !already_registered {
            let peer = Peer {
                outbox: spawn_writer(Arc::clone(&conn)),
                conn,
            };
            if let Some(previous) = self.registry.insert(id.clone(), peer) {
                // Same identity reconnected: the old stream must not linger.
                previous.conn.close();
                info!(conn_id = %id, "connection superseded, closing previous stream");
            }
        }

        let online = self.sync_count();
        debug!(conn_id = %id, online, "connection registered");
        self.publish_presence(online);
    }

    fn unregister(&mut self, conn: Arc<Connection>) {
        let is_current = self
            .registry
            .get(conn.id())
            .is_some_and(|peer| Arc::ptr_eq(&peer.conn, &conn));
        if !is_current {
            trace!(conn_id = %conn.id(), "unregister ignored, not the registered connection");
            return;
        }

        self.registry.remove(conn.id());
        let online = self.sync_count();
        debug!(conn_id = %conn.id(), online, "connection unregistered");
        self.publish_presence(online);
    }

    fn sync_count(&self) -> usize {
        let online = self.registry.len();
        self.online.store(online, Ordering::Release);
        online
    }

    /// Render and fan out the online-count fragment. A failed render drops
    /// this one notification only.
    fn publish_presence(&self, online: usize) {
        let rendered = std::panic::catch_unwind(AssertUnwindSafe(|| self.renderer.render(online)));
        match rendered {
            Ok(Ok(html)) => self.dispatch(&Event::new(ONLINE_COUNT_EVENT, html)),
            Ok(Err(e)) => warn!(online, error = %e, "online counter render failed"),
            Err(_) => error!(online, "online counter renderer panicked"),
        }
    }

    /// Queue the frame on every eligible connection's outbox. The registry is
    /// iterated here, on the coordinator, so each event sees one snapshot and
    /// every outbox receives events in dispatch order.
    fn dispatch(&self, event: &Event) {
        let frame = event.to_frame();
        let name: Arc<str> = Arc::from(event.name());
        let mut queued = 0usize;

        for peer in self.registry.values() {
            if !event.is_for(peer.conn.id()) {
                continue;
            }
            let outgoing = Outgoing {
                frame: frame.clone(),
                event: Arc::clone(&name),
            };
            if peer.outbox.send(outgoing).is_err() {
                trace!(conn_id = %peer.conn.id(), event = %name, "writer already stopped");
                continue;
            }
            queued += 1;
        }
        trace!(event = %name, recipients = queued, "event dispatched");
    }
}

/// Start the writer task for `conn`. Frames are written one at a time in
/// queue order; the task ends when the connection is done or its registry
/// entry is dropped.
fn spawn_writer(conn: Arc<Connection>) -> mpsc::UnboundedSender<Outgoing> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = conn.done().cancelled() => None,
                next = rx.recv() => next,
            };
            let Some(Outgoing { frame, event }) = next else {
                break;
            };
            deliver_one(&conn, frame, &event).await;
        }
        trace!(conn_id = %conn.id(), "writer stopped");
    });
    tx
}

/// One delivery, isolated from the coordinator and from other connections:
/// errors and panics end here and the writer moves on to the next frame.
async fn deliver_one(conn: &Connection, frame: Bytes, event: &str) {
    let outcome = AssertUnwindSafe(conn.deliver(frame)).catch_unwind().await;
    match outcome {
        Ok(Ok(Delivery::Written)) => {
            trace!(conn_id = %conn.id(), event = %event, "event delivered");
        }
        Ok(Ok(Delivery::Skipped)) => {
            debug!(conn_id = %conn.id(), event = %event, "connection done, delivery skipped");
        }
        Ok(Err(e)) => {
            warn!(conn_id = %conn.id(), event = %event, error = %e, "delivery failed");
        }
        Err(_) => {
            error!(conn_id = %conn.id(), event = %event, "delivery panicked");
        }
    }
}
