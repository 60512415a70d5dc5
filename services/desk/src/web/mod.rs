pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

#[cfg(test)]
mod testing;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{upload_handler, view_handler};
pub use ws_handler::ws_handler;

use state::AppState;

/// The coordinator's routes, without CORS. Uploads are limited to 50 MiB.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/view", get(view_handler))
        .route("/uploads", post(upload_handler))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .with_state(app_state)
}
