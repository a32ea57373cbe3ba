//! Social feed API: media posts with likes and comments, served over JSON.
//!
//! Posts live in one of two stores picked at startup (see [`config::Backend`]):
//! relational tables in SQLite, or normalized keys in Redis. Media never passes
//! through the service; clients upload straight to S3 with a presigned URL.

pub mod aws_clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod startup;
pub mod storage;

use crate::{
    config::{Backend, Config},
    domain::{MediaStorage, PostRepository},
    errors::AppError,
    storage::S3MediaStorage,
};
use std::sync::Arc;

/// Shared resources handed to every handler.
pub struct AppState {
    pub post_repo: Arc<dyn PostRepository>,
    pub media_storage: Arc<dyn MediaStorage>,
    pub backend: Backend,
    pub feed_limit: usize,
}

/// Connects every backing service, then serves until the listener fails.
pub async fn run(config: Config) -> Result<(), AppError> {
    let post_repo = startup::build_post_repository(&config).await?;

    tracing::info!("Initializing AWS S3 client...");
    let sdk_config = aws_clients::create_sdk_config(&config.media).await;
    let s3_client = aws_clients::create_s3_client(&sdk_config);
    startup::ensure_s3_bucket_exists(&s3_client, &config.media.bucket_name, &config.media.aws_region)
        .await?;
    let media_storage = Arc::new(S3MediaStorage::new(s3_client, &config.media));

    let state = Arc::new(AppState {
        post_repo,
        media_storage,
        backend: config.backend,
        feed_limit: config.feed_limit,
    });
    let app = routes::create_router(state, config.cors_allowed_origin.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| AppError::InitError(format!("Failed to bind {}: {}", config.bind_address, e)))?;
    tracing::info!(backend = %config.backend, "Server listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::InitError(format!("Server error: {}", e)))?;
    Ok(())
}
