//! Router and shared state for the HTTP API.
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::generation::ImageGenerator;

/// Request bodies (JSON or multipart uploads) are capped at 15 MB.
pub const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;

pub struct AppState {
    pub generator: ImageGenerator,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/generate", post(handlers::generate))
        .route("/api/img2img", post(handlers::img2img))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
