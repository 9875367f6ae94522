use std::fmt::Write;

use hsync_core::OriginatorId;

use super::{escape, online_badge};
use crate::experiments::canvas::{
    CanvasBoard, DrawingElement, Geometry, ShapeKind, CLEARED_EVENT, ELEMENT_ADDED_EVENT,
};

const STROKE_WIDTH: u32 = 3;

/// SVG markup for one element, wrapped in a `<g>` carrying its id.
pub fn element(el: &DrawingElement) -> String {
    let color = escape(&el.color);
    let shape = match (&el.geometry, el.kind) {
        (Geometry::Path(d), _) => format!(
            r#"<path d="{d}" stroke="{color}" stroke-width="{STROKE_WIDTH}" fill="none" stroke-linecap="round" stroke-linejoin="round"/>"#,
            d = escape(d),
        ),
        (Geometry::Coords(c), ShapeKind::Circle) => format!(
            r#"<circle cx="{}" cy="{}" r="{}" stroke="{color}" stroke-width="{STROKE_WIDTH}" fill="none"/>"#,
            c[0], c[1], c[2]
        ),
        (Geometry::Coords(c), ShapeKind::Rect) => format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" stroke="{color}" stroke-width="{STROKE_WIDTH}" fill="none"/>"#,
            c[0], c[1], c[2], c[3]
        ),
        (Geometry::Coords(c), _) => format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}" stroke-width="{STROKE_WIDTH}" stroke-linecap="round"/>"#,
            c[0], c[1], c[2], c[3]
        ),
    };
    let user = el
        .user
        .as_deref()
        .map(|u| format!(r#" data-user="{}""#, escape(u)))
        .unwrap_or_default();
    format!(
        r#"<g id="{id}" class="drawing-element" data-kind="{kind}"{user}>{shape}</g>"#,
        id = escape(&el.id),
        kind = el.kind,
    )
}

/// The whole drawing surface. Swapped in wholesale on `canvas-cleared`.
pub fn canvas_svg(board: &CanvasBoard) -> String {
    let elements = board.snapshot();
    let mut html = format!(
        r#"<svg id="drawing-canvas" xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="white"/><g id="canvas-elements" sse-swap="{ELEMENT_ADDED_EVENT}" hx-swap="beforeend">"#,
        w = board.width(),
        h = board.height(),
    );
    for el in &elements {
        html.push_str(&element(el));
    }
    html.push_str("</g></svg>");
    html
}

pub fn page_content(board: &CanvasBoard, originator: &OriginatorId, online: usize) -> String {
    let originator = escape(originator.as_str());
    let mut html = String::new();
    let _ = write!(
        html,
        r##"<section class="experiment canvas" data-originator="{originator}">
<header class="stats"><h1>Canvas</h1>{badge}</header>
<form id="canvas-tools" class="toolbar">
<label>Shape <select name="type"><option value="path">Freehand</option><option value="line">Line</option><option value="rect">Rectangle</option><option value="circle">Circle</option></select></label>
<label>Color <input type="color" name="color" value="#000000"></label>
<button type="button" hx-post="/experiments/canvas-draw-sync/clear" hx-target="#canvas-host" hx-swap="innerHTML">Clear</button>
</form>
<div hx-ext="sse" sse-connect="/events?originator={originator}" id="sse-wrapper">
<div id="canvas-host" class="canvas-host" sse-swap="{CLEARED_EVENT}" hx-swap="innerHTML">{svg}</div>
</div>
</section>"##,
        badge = online_badge(online),
        svg = canvas_svg(board),
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_markup_is_escaped_and_tagged() {
        let el = DrawingElement::parse("rect", "1,2,3,4", Some("#abc"), Some("tab\"1".into())).unwrap();
        let html = element(&el);
        assert!(html.contains(r#"<rect x="1" y="2" width="3" height="4""#));
        assert!(html.contains(r#"data-user="tab&quot;1""#));
        assert!(html.contains(r##"stroke="#abc""##));
    }

    #[test]
    fn empty_canvas_has_listening_group() {
        let board = CanvasBoard::new(1200, 800);
        let svg = canvas_svg(&board);
        assert!(svg.contains(r#"viewBox="0 0 1200 800""#));
        assert!(svg.contains(r#"sse-swap="canvas-element-added""#));
        assert!(!svg.contains("drawing-element"));
    }
}
