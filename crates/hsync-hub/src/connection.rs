use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::sink::EventSink;

/// Outcome of one delivery attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Written,
    /// The connection was already done (or finished mid-write); nothing sent.
    Skipped,
}

/// One open event stream.
///
/// Owned by the handler that serves the stream. The hub keeps an `Arc` while
/// the connection is registered and compares entries by pointer, so two
/// connections with the same identity are still distinct.
pub struct Connection {
    id: String,
    sink: Arc<dyn EventSink>,
    done: CancellationToken,
}

impl Connection {
    pub fn new(id: impl Into<String>, sink: Arc<dyn EventSink>, done: CancellationToken) -> Self {
        Self {
            id: id.into(),
            sink,
            done,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token fired when the stream ends. The connection's writer stops on it.
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Mark the stream finished. Idempotent.
    pub fn close(&self) {
        self.done.cancel();
    }

    /// Write one frame unless the connection is done.
    ///
    /// A write still pending when the connection finishes is abandoned and
    /// reported as [`Delivery::Skipped`].
    pub async fn deliver(&self, frame: Bytes) -> Result<Delivery> {
        if self.done.is_cancelled() {
            return Ok(Delivery::Skipped);
        }
        tokio::select! {
            biased;
            _ = self.done.cancelled() => Ok(Delivery::Skipped),
            res = self.sink.write_frame(frame) => res.map(|()| Delivery::Written),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("done", &self.done.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;

    #[tokio::test]
    async fn deliver_writes_when_open() {
        let (sink, mut rx) = ChannelSink::channel(1);
        let conn = Connection::new("a", Arc::new(sink), CancellationToken::new());

        let outcome = conn.deliver(Bytes::from_static(b"frame")).await.unwrap();
        assert_eq!(outcome, Delivery::Written);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn deliver_skips_closed_connection() {
        let (sink, mut rx) = ChannelSink::channel(1);
        let conn = Connection::new("a", Arc::new(sink), CancellationToken::new());
        conn.close();

        let outcome = conn.deliver(Bytes::from_static(b"frame")).await.unwrap();
        assert_eq!(outcome, Delivery::Skipped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pending_write_is_released_by_close() {
        // Buffer of one, already full: the next write waits for capacity.
        let (sink, _rx) = ChannelSink::channel(1);
        let conn = Arc::new(Connection::new("a", Arc::new(sink), CancellationToken::new()));
        conn.deliver(Bytes::from_static(b"first")).await.unwrap();

        let pending = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.deliver(Bytes::from_static(b"second")).await })
        };
        tokio::task::yield_now().await;
        conn.close();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, Delivery::Skipped);
    }
}
