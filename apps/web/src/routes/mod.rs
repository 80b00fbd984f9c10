pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Interactive page
        .route("/", get(handlers::handle_index))
        .route("/analyze", post(handlers::handle_analyze))
        .route("/match", post(handlers::handle_match))
        .route("/read-aloud/:target", post(handlers::handle_read_aloud))
        .route("/cancel", post(handlers::handle_cancel))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
