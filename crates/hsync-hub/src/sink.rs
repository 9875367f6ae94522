use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{HubError, Result};

/// Output side of one streaming client.
///
/// The hub calls `write_frame` from a single writer task per connection, one
/// frame at a time.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write one encoded frame and flush it to the client.
    async fn write_frame(&self, frame: Bytes) -> Result<()>;
}

/// Sink backed by a bounded channel whose receiver feeds an HTTP response
/// body. A full channel makes the writer wait; a dropped receiver means the
/// client went away.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Sink plus the receiver the response body should drain.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write_frame(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| HubError::ConnectionClosed)
    }
}
