use axum::{
    http::HeaderMap,
    response::{Html, Redirect},
};

use crate::render::{self, EXPERIMENTS};

/// GET /
pub async fn index_handler() -> Redirect {
    Redirect::temporary("/experiments")
}

/// GET /experiments
pub async fn experiments_handler(headers: HeaderMap) -> Html<String> {
    let content = render::experiments_list(EXPERIMENTS);
    if render::is_htmx(&headers) {
        Html(content)
    } else {
        Html(render::layout("Experiments", &content))
    }
}
