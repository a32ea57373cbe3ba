use crate::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Request bodies are small JSON documents; media goes straight to object storage.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Creates the Axum router: one route per operation, each answering 405 to other verbs.
pub fn create_router(state: Arc<AppState>, allowed_origin: HeaderValue) -> Router {
    Router::new()
        .route(
            "/api/submit",
            post(handlers::submit_post).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/feed",
            get(handlers::get_feed).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/like",
            post(handlers::like_post).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/comment",
            post(handlers::comment_on_post).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/create-upload-url",
            post(handlers::create_upload_url).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
