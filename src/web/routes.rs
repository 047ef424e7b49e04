use super::handlers;
use super::state::AppState;
use crate::services::library::MEDIA_URL_PREFIX;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

pub fn page_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(handlers::public::index))
}

pub fn upload_routes(max_request_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/upload",
        post(handlers::upload::upload)
            .fallback(handlers::upload::method_not_allowed)
            .layer(DefaultBodyLimit::max(max_request_bytes)),
    )
}

/// Stored files, served straight from disk with range and conditional
/// request support.
pub fn media_routes(upload_dir: &Path) -> Router<Arc<AppState>> {
    Router::new().nest_service(MEDIA_URL_PREFIX, ServeDir::new(upload_dir))
}
