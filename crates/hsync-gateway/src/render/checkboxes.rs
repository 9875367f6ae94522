use std::fmt::Write;

use hsync_core::OriginatorId;

use super::{escape, online_badge};

pub const TOGGLE_PATH: &str = "/experiments/checkboxes/toggle";

/// Input and label for one checkbox. This is what both the toggling tab and
/// the event stream swap into `#checkbox-{id}`.
pub fn checkbox_inner(id: usize, checked: bool) -> String {
    let checked_attr = if checked { " checked" } else { "" };
    format!(
        r##"<input type="checkbox" id="cb-{id}"{checked_attr} hx-post="{TOGGLE_PATH}/{id}" hx-target="#checkbox-{id}" hx-swap="innerHTML"><label for="cb-{id}">{id}</label>"##
    )
}

/// Wrapper that listens for `checkbox-{id}-updated` on the page's stream.
pub fn checkbox_item(id: usize, checked: bool) -> String {
    format!(
        r#"<div class="checkbox-item" id="checkbox-{id}" sse-swap="{event}" hx-swap="innerHTML">{inner}</div>"#,
        event = update_event(id),
        inner = checkbox_inner(id, checked),
    )
}

/// Event name used for a single checkbox's updates.
pub fn update_event(id: usize) -> String {
    format!("checkbox-{id}-updated")
}

/// Grid content. `cells[i]` is checkbox `i + 1`.
pub fn page_content(cells: &[bool], originator: &OriginatorId, online: usize) -> String {
    let checked = cells.iter().filter(|c| **c).count();
    let originator = escape(originator.as_str());

    let mut html = String::with_capacity(cells.len() * 220 + 1024);
    let _ = write!(
        html,
        r#"<section class="experiment checkboxes" data-originator="{originator}">
<header class="stats"><h1>{total} Checkboxes</h1>{badge}<p><strong>Checked: <span id="checked-count">{checked}</span> / {total}</strong></p></header>
<div hx-ext="sse" sse-connect="/events?originator={originator}" id="sse-wrapper">
<div class="checkbox-grid" id="checkbox-grid">"#,
        total = cells.len(),
        badge = online_badge(online),
    );
    for (idx, checked) in cells.iter().enumerate() {
        html.push_str(&checkbox_item(idx + 1, *checked));
    }
    html.push_str("</div></div></section>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_reflects_state() {
        assert!(checkbox_inner(7, true).contains(r#"id="cb-7" checked"#));
        assert!(!checkbox_inner(7, false).contains("checked"));
        assert!(checkbox_inner(7, false).contains("/experiments/checkboxes/toggle/7"));
    }

    #[test]
    fn item_listens_for_its_own_event() {
        let html = checkbox_item(42, false);
        assert!(html.contains(r#"sse-swap="checkbox-42-updated""#));
        assert!(html.contains(r#"id="checkbox-42""#));
    }

    #[test]
    fn page_connects_stream_with_originator() {
        let id = OriginatorId::parse("page-abc").unwrap();
        let html = page_content(&[true, false, true], &id, 2);
        assert!(html.contains("/events?originator=page-abc"));
        assert!(html.contains(r#"<span id="checked-count">2</span> / 3"#));
        assert!(html.contains("2 users online"));
    }
}
