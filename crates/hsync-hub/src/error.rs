use thiserror::Error;

/// Errors surfaced by the hub and by connection sinks.
#[derive(Debug, Error)]
pub enum HubError {
    /// The client side of the stream is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// The broadcast queue is full and the hub is configured to reject.
    #[error("broadcast queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The coordinator task is no longer running.
    #[error("hub stopped")]
    HubStopped,

    /// The presence fragment could not be rendered.
    #[error("render failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, HubError>;
