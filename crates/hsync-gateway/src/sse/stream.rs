use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use hsync_core::OriginatorId;
use hsync_hub::{ChannelSink, Connection, Hub};
use serde::Deserialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::app::AppState;
use crate::http::error::ApiError;

const CONNECTED_FRAME: &[u8] = b": connected\n\n";
const KEEPALIVE_FRAME: &[u8] = b": keep-alive\n\n";

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub originator: Option<String>,
}

/// Unregisters the connection when the response body is dropped, whether the
/// client went away or the stream ended on its own.
struct StreamGuard {
    hub: Hub,
    conn: Arc<Connection>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!(identity = %self.conn.id(), "event stream closed");
        self.conn.close();
        self.hub.unregister(Arc::clone(&self.conn));
    }
}

/// GET /events?originator=<id>
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let identity = match query.originator.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => OriginatorId::parse(raw)?,
        None => OriginatorId::generate("sse"),
    };

    let (sink, mut frames) = ChannelSink::channel(state.config.hub.connection_buffer);
    let done = state.shutdown.child_token();
    let conn = Arc::new(Connection::new(identity.into_string(), Arc::new(sink), done.clone()));
    info!(identity = %conn.id(), "event stream opened");
    state.hub.register(Arc::clone(&conn));

    let guard = StreamGuard {
        hub: state.hub.clone(),
        conn,
    };
    let keepalive = match state.config.hub.keepalive_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let body = async_stream::stream! {
        let _guard = guard;
        yield Ok::<Bytes, Infallible>(Bytes::from_static(CONNECTED_FRAME));

        // A disabled keep-alive still needs a timer to select on; it never fires.
        let period = keepalive.unwrap_or(Duration::from_secs(86_400));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next = tokio::select! {
                biased;
                _ = done.cancelled() => None,
                frame = frames.recv() => frame,
                _ = ticker.tick(), if keepalive.is_some() => Some(Bytes::from_static(KEEPALIVE_FRAME)),
            };
            match next {
                Some(frame) => yield Ok(frame),
                None => break,
            }
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no")),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
