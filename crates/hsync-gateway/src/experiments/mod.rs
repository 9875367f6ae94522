//! Experiments: domain state plus the page and mutation handlers that feed
//! the hub.
//!
//! Every mutation follows the same shape: validate, apply, render the changed
//! fragment, broadcast it excluding the tab that made the change, and return
//! the same fragment to that tab directly.

pub mod canvas;
pub mod checkboxes;

use axum::http::HeaderMap;
use hsync_hub::{Event, HubError};
use tracing::warn;

use crate::app::AppState;

pub const ORIGINATOR_HEADER: &str = "X-Originator-ID";

/// The acting tab's id from `X-Originator-ID`, if present and non-empty.
pub fn originator_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ORIGINATOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Hand `event` to the hub. The mutation already happened, so a rejected
/// broadcast is logged rather than failing the request.
pub async fn publish(state: &AppState, event: Event) {
    let name = event.name().to_string();
    match state.hub.broadcast(event).await {
        Ok(()) => {}
        Err(HubError::QueueFull { capacity }) => {
            warn!(event = %name, capacity, "broadcast queue full, update not pushed");
        }
        Err(e) => warn!(event = %name, error = %e, "broadcast failed"),
    }
}
