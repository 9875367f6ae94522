//! Collaborative drawing canvas: page, draw and clear handlers.
//!
//! Elements are kept in memory in drawing order. Each draw is broadcast as
//! `canvas-element-added` (appended by listening tabs); a clear broadcasts the
//! empty canvas as `canvas-cleared`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use axum::{
    extract::State,
    http::HeaderMap,
    response::Html,
    Form,
};
use hsync_core::{OriginatorId, SyncError};
use hsync_hub::Event;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::http::error::ApiError;
use crate::render::{self, canvas as view};

pub const ELEMENT_ADDED_EVENT: &str = "canvas-element-added";
pub const CLEARED_EVENT: &str = "canvas-cleared";
pub const MAX_ELEMENTS: usize = 10_000;
const MAX_PATH_LEN: usize = 20_000;
const DEFAULT_COLOR: &str = "#000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `data` is SVG path data (`M10 10 L20 20`).
    Path,
    /// `data` is `cx,cy,r`.
    Circle,
    /// `data` is `x,y,width,height`.
    Rect,
    /// `data` is `x1,y1,x2,y2`.
    Line,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Path => "path",
            ShapeKind::Circle => "circle",
            ShapeKind::Rect => "rect",
            ShapeKind::Line => "line",
        }
    }

    fn coordinate_count(self) -> Option<usize> {
        match self {
            ShapeKind::Path => None,
            ShapeKind::Circle => Some(3),
            ShapeKind::Rect | ShapeKind::Line => Some(4),
        }
    }
}

impl FromStr for ShapeKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "path" => Ok(ShapeKind::Path),
            "circle" => Ok(ShapeKind::Circle),
            "rect" => Ok(ShapeKind::Rect),
            "line" => Ok(ShapeKind::Line),
            other => Err(SyncError::InvalidInput(format!("unknown shape type: {other}"))),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated shape geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Path(String),
    Coords(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct DrawingElement {
    pub id: String,
    pub kind: ShapeKind,
    pub geometry: Geometry,
    pub color: String,
    pub user: Option<String>,
}

impl DrawingElement {
    /// Validate raw form input into an element.
    pub fn parse(kind: &str, data: &str, color: Option<&str>, user: Option<String>) -> Result<Self, SyncError> {
        let kind: ShapeKind = kind.parse()?;
        let geometry = parse_geometry(kind, data)?;
        let color = parse_color(color)?;
        Ok(Self {
            id: format!("elem-{}", Uuid::new_v4().simple()),
            kind,
            geometry,
            color,
            user,
        })
    }
}

fn parse_geometry(kind: ShapeKind, data: &str) -> Result<Geometry, SyncError> {
    let data = data.trim();
    match kind.coordinate_count() {
        None => {
            if data.len() > MAX_PATH_LEN {
                return Err(SyncError::InvalidInput("path data too long".into()));
            }
            let allowed = |c: char| {
                c.is_ascii_digit() || c.is_ascii_whitespace() || ",.-+eE".contains(c) || "MmLlHhVvCcSsQqTtAaZz".contains(c)
            };
            if !data.chars().all(allowed) {
                return Err(SyncError::InvalidInput("path data contains invalid characters".into()));
            }
            Ok(Geometry::Path(data.to_string()))
        }
        Some(expected) => {
            let coords = data
                .split(',')
                .map(|part| part.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| SyncError::InvalidInput(format!("{kind} data must be numbers")))?;
            if coords.len() != expected || coords.iter().any(|c| !c.is_finite()) {
                return Err(SyncError::InvalidInput(format!(
                    "{kind} data needs {expected} comma-separated numbers"
                )));
            }
            Ok(Geometry::Coords(coords))
        }
    }
}

fn parse_color(color: Option<&str>) -> Result<String, SyncError> {
    let Some(color) = color.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(DEFAULT_COLOR.to_string());
    };
    let hex = color.strip_prefix('#').unwrap_or("");
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(color.to_ascii_lowercase())
    } else {
        Err(SyncError::InvalidInput(format!("invalid color: {color}")))
    }
}

/// Shared drawing surface.
pub struct CanvasBoard {
    width: u32,
    height: u32,
    elements: RwLock<Vec<DrawingElement>>,
}

impl CanvasBoard {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            elements: RwLock::new(Vec::new()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn add(&self, element: DrawingElement) -> Result<(), SyncError> {
        let mut elements = self.elements.write().expect("canvas lock poisoned");
        if elements.len() >= MAX_ELEMENTS {
            return Err(SyncError::InvalidInput("canvas is full, clear it first".into()));
        }
        elements.push(element);
        Ok(())
    }

    pub fn clear(&self) -> usize {
        let mut elements = self.elements.write().expect("canvas lock poisoned");
        let removed = elements.len();
        elements.clear();
        removed
    }

    pub fn snapshot(&self) -> Vec<DrawingElement> {
        self.elements.read().expect("canvas lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.elements.read().expect("canvas lock poisoned").len()
    }
}

#[derive(Debug, Deserialize)]
pub struct DrawForm {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: String,
    pub color: Option<String>,
}

/// GET /experiments/canvas-draw-sync
pub async fn page_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let originator = OriginatorId::generate("canvas");
    let content = view::page_content(&state.canvas, &originator, state.hub.online_count());

    if render::is_htmx(&headers) {
        Html(content)
    } else {
        Html(render::layout("Canvas", &content))
    }
}

/// POST /experiments/canvas-draw-sync/draw
pub async fn draw_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<DrawForm>,
) -> Result<Html<String>, ApiError> {
    if form.kind.trim().is_empty() || form.data.trim().is_empty() {
        return Err(SyncError::InvalidInput("missing drawing data".into()).into());
    }
    let originator = super::originator_header(&headers);
    let element = DrawingElement::parse(&form.kind, &form.data, form.color.as_deref(), originator.clone())?;
    let fragment = view::element(&element);
    state.canvas.add(element)?;

    info!(
        originator = originator.as_deref().unwrap_or("-"),
        bytes = fragment.len(),
        "broadcasting canvas element"
    );
    super::publish(
        &state,
        Event::new(ELEMENT_ADDED_EVENT, fragment.clone()).excluding(originator.unwrap_or_default()),
    )
    .await;

    Ok(Html(fragment))
}

/// POST /experiments/canvas-draw-sync/clear
pub async fn clear_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let originator = super::originator_header(&headers);
    let removed = state.canvas.clear();
    let fragment = view::canvas_svg(&state.canvas);

    info!(removed, "canvas cleared");
    super::publish(
        &state,
        Event::new(CLEARED_EVENT, fragment.clone()).excluding(originator.unwrap_or_default()),
    )
    .await;

    Html(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_circle() {
        let el = DrawingElement::parse("circle", "10, 20, 5", Some("#FF0000"), None).unwrap();
        assert_eq!(el.kind, ShapeKind::Circle);
        assert_eq!(el.geometry, Geometry::Coords(vec![10.0, 20.0, 5.0]));
        assert_eq!(el.color, "#ff0000");
        assert!(el.id.starts_with("elem-"));
    }

    #[test]
    fn rejects_wrong_arity_and_unknown_kind() {
        assert!(DrawingElement::parse("rect", "1,2,3", None, None).is_err());
        assert!(DrawingElement::parse("polygon", "1,2", None, None).is_err());
        assert!(DrawingElement::parse("line", "1,2,x,4", None, None).is_err());
    }

    #[test]
    fn path_data_is_restricted() {
        assert!(DrawingElement::parse("path", "M10 10 L20 20 Z", None, None).is_ok());
        assert!(DrawingElement::parse("path", r#"M0 0"/><script>"#, None, None).is_err());
    }

    #[test]
    fn color_defaults_and_validation() {
        let el = DrawingElement::parse("line", "0,0,1,1", None, None).unwrap();
        assert_eq!(el.color, DEFAULT_COLOR);
        assert!(DrawingElement::parse("line", "0,0,1,1", Some("red;"), None).is_err());
    }

    #[test]
    fn board_add_and_clear() {
        let board = CanvasBoard::new(100, 100);
        board
            .add(DrawingElement::parse("circle", "1,1,1", None, None).unwrap())
            .unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.clear(), 1);
        assert_eq!(board.len(), 0);
    }
}
