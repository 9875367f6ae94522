//! Shared checkbox grid: page and toggle handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Html,
};
use hsync_core::{OriginatorId, SyncError};
use hsync_hub::Event;
use tracing::debug;

use crate::app::AppState;
use crate::http::error::ApiError;
use crate::render::{self, checkboxes as view};

/// Fixed-size grid of checkboxes numbered from 1. Toggles are lock-free.
pub struct CheckboxBoard {
    cells: Vec<AtomicBool>,
}

impl CheckboxBoard {
    pub fn new(count: usize) -> Self {
        Self {
            cells: (0..count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Flip checkbox `id` (1-based) and return its new state.
    pub fn toggle(&self, id: usize) -> Result<bool, SyncError> {
        let cell = id
            .checked_sub(1)
            .and_then(|idx| self.cells.get(idx))
            .ok_or_else(|| SyncError::InvalidInput("Checkbox ID out of range".into()))?;
        Ok(!cell.fetch_xor(true, Ordering::AcqRel))
    }

    pub fn get(&self, id: usize) -> Option<bool> {
        id.checked_sub(1)
            .and_then(|idx| self.cells.get(idx))
            .map(|c| c.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> Vec<bool> {
        self.cells.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }
}

/// GET /experiments/checkboxes
pub async fn page_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let originator = OriginatorId::generate("page");
    let cells = state.checkboxes.snapshot();
    let content = view::page_content(&cells, &originator, state.hub.online_count());

    if render::is_htmx(&headers) {
        Html(content)
    } else {
        Html(render::layout("Checkboxes", &content))
    }
}

/// POST /experiments/checkboxes/toggle/{id}
pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let id: usize = raw_id
        .parse()
        .map_err(|_| SyncError::InvalidInput("Invalid checkbox ID".into()))?;
    let checked = state.checkboxes.toggle(id)?;
    let fragment = view::checkbox_inner(id, checked);
    let originator = super::originator_header(&headers);

    debug!(id, checked, originator = originator.as_deref().unwrap_or("-"), "checkbox toggled");
    super::publish(
        &state,
        Event::new(view::update_event(id), fragment.clone())
            .excluding(originator.unwrap_or_default()),
    )
    .await;

    Ok(Html(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_and_reports_new_state() {
        let board = CheckboxBoard::new(3);
        assert!(board.toggle(2).unwrap());
        assert_eq!(board.get(2), Some(true));
        assert!(!board.toggle(2).unwrap());
        assert_eq!(board.snapshot(), vec![false, false, false]);
    }

    #[test]
    fn toggle_rejects_out_of_range() {
        let board = CheckboxBoard::new(3);
        assert!(board.toggle(0).is_err());
        assert!(board.toggle(4).is_err());
        assert_eq!(board.get(4), None);
    }
}
