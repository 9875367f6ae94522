//! Server-side HTML rendering.
//!
//! Every page has two shapes: the full document for direct navigation and the
//! bare content for htmx requests (`HX-Request: true`), which swap it into an
//! already loaded layout.

pub mod canvas;
pub mod checkboxes;

use std::fmt::Write;

use axum::http::HeaderMap;

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.4";
const HTMX_SSE_SRC: &str = "https://unpkg.com/htmx-ext-sse@2.2.2/sse.js";

/// Escape text for use in element content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// True when the request came from htmx and wants a fragment.
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// Wrap page content in the shared document layout.
pub fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} · Hypermedia Sync</title>
    <link rel="stylesheet" href="/static/style.css">
    <script src="{HTMX_SRC}"></script>
    <script src="{HTMX_SSE_SRC}"></script>
    <script src="/static/app.js" defer></script>
</head>
<body>
    <nav class="topbar"><a href="/experiments">Experiments</a></nav>
    <main>
{content}
    </main>
</body>
</html>
"#,
        title = escape(title),
    )
}

/// The live counter swapped in on every `online-count-updated` event.
pub fn online_counter(online: usize) -> String {
    let noun = if online == 1 { "user" } else { "users" };
    format!(r#"<span class="online-count">{online} {noun} online</span>"#)
}

/// Presence renderer handed to the hub.
pub fn presence_fragment(online: usize) -> hsync_hub::Result<String> {
    Ok(online_counter(online))
}

/// Container that receives counter updates over the page's event stream.
pub fn online_badge(online: usize) -> String {
    format!(
        r#"<div class="online" sse-swap="online-count-updated" hx-swap="innerHTML">{}</div>"#,
        online_counter(online)
    )
}

/// One entry on the experiments index.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub path: &'static str,
    pub status: &'static str,
}

pub const EXPERIMENTS: &[Experiment] = &[
    Experiment {
        id: "checkboxes",
        name: "10,000 Checkboxes",
        description: "Real-time synchronized checkboxes demonstrating hypermedia-driven state management with SSE",
        path: "/experiments/checkboxes",
        status: "Active",
    },
    Experiment {
        id: "canvas-draw-sync",
        name: "Canvas",
        description: "Collaborative real-time canvas where multiple users can draw, sketch, and create together using pure hypermedia",
        path: "/experiments/canvas-draw-sync",
        status: "Active",
    },
];

pub fn experiments_list(experiments: &[Experiment]) -> String {
    let mut html = String::from(
        r#"<section class="experiments"><h1>Experiments</h1><ul class="experiment-list">"#,
    );
    for exp in experiments {
        let _ = write!(
            html,
            r#"<li class="experiment" id="experiment-{id}"><a href="{path}" hx-get="{path}" hx-target="main" hx-push-url="true"><h2>{name}</h2></a><p>{description}</p><span class="status">{status}</span></li>"#,
            id = escape(exp.id),
            path = escape(exp.path),
            name = escape(exp.name),
            description = escape(exp.description),
            status = escape(exp.status),
        );
    }
    html.push_str("</ul></section>");
    html
}
