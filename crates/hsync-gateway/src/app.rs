use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use hsync_core::HsyncConfig;
use hsync_hub::Hub;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::experiments::{
    canvas::{self, CanvasBoard},
    checkboxes::{self, CheckboxBoard},
};
use crate::rate_limit::{self, RateLimiter};

/// Central shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: HsyncConfig,
    pub hub: Hub,
    pub checkboxes: CheckboxBoard,
    pub canvas: CanvasBoard,
    pub limiter: RateLimiter,
    /// Cancelled on shutdown; every event stream holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: HsyncConfig, hub: Hub) -> Self {
        let checkboxes = CheckboxBoard::new(config.experiments.checkbox_count);
        let canvas = CanvasBoard::new(config.experiments.canvas_width, config.experiments.canvas_height);
        let limiter = RateLimiter::new(&config.rate_limit);
        Self {
            config,
            hub,
            checkboxes,
            canvas,
            limiter,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mutations = Router::new()
        .route("/experiments/checkboxes/toggle/{id}", post(checkboxes::toggle_handler))
        .route("/experiments/canvas-draw-sync/draw", post(canvas::draw_handler))
        .route("/experiments/canvas-draw-sync/clear", post(canvas::clear_handler))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), rate_limit::limit));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([header::RETRY_AFTER]);

    Router::new()
        .route("/", get(crate::http::pages::index_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/experiments", get(crate::http::pages::experiments_handler))
        .route("/experiments/checkboxes", get(checkboxes::page_handler))
        .route("/experiments/canvas-draw-sync", get(canvas::page_handler))
        .route("/events", get(crate::sse::events_handler))
        .merge(mutations)
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
