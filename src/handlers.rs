use crate::{
    errors::AppError,
    models::{
        Comment, CommentRequest, LikeRequest, NewPost, Post, SubmitPostRequest, UploadUrlRequest,
        UploadUrls,
    },
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Serialize, Debug)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
}

#[derive(Serialize, Debug)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub backend: &'static str,
}

// Absent and empty strings both count as missing.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// POST /api/submit
pub async fn submit_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitPostRequest>, JsonRejection>,
) -> Result<Json<PostResponse>, AppError> {
    let Json(body) = payload?;
    let (Some(media_url), Some(media_type)) = (required(body.media_url), required(body.media_type))
    else {
        return Err(AppError::Validation("media required"));
    };

    let post = state
        .post_repo
        .create(NewPost {
            author: body.author,
            caption: body.caption,
            media_url,
            media_type,
        })
        .await?;

    tracing::info!(post_id = %post.id, "Post created via handler");
    Ok(Json(PostResponse { post }))
}

/// GET /api/feed
pub async fn get_feed(State(state): State<Arc<AppState>>) -> Result<Json<FeedResponse>, AppError> {
    tracing::debug!(limit = state.feed_limit, "Loading feed via handler");
    let posts = state.post_repo.feed(state.feed_limit).await?;
    tracing::info!("Handler successfully retrieved {} posts", posts.len());
    Ok(Json(FeedResponse { posts }))
}

/// POST /api/like
pub async fn like_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<Ack>, AppError> {
    let Json(body) = payload?;
    let (Some(post_id), Some(session_id)) = (required(body.post_id), required(body.session_id))
    else {
        return Err(AppError::Validation("missing"));
    };
    let post_id = Uuid::parse_str(&post_id)?;

    state.post_repo.like(post_id, &session_id).await?;

    tracing::debug!(%post_id, "Like recorded via handler");
    Ok(Json(Ack { ok: true }))
}

/// POST /api/comment
pub async fn comment_on_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Json<Ack>, AppError> {
    let Json(body) = payload?;
    let (Some(post_id), Some(author), Some(text)) =
        (required(body.post_id), required(body.author), required(body.text))
    else {
        return Err(AppError::Validation("missing"));
    };
    let post_id = Uuid::parse_str(&post_id)?;

    let comment = Comment::new(post_id, &author, &text);
    state.post_repo.add_comment(&comment).await?;

    tracing::debug!(%post_id, "Comment added via handler");
    Ok(Json(Ack { ok: true }))
}

/// POST /api/create-upload-url
pub async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<UploadUrls>, AppError> {
    let Json(body) = payload?;
    let (Some(filename), Some(content_type)) = (required(body.filename), required(body.content_type))
    else {
        return Err(AppError::Validation("filename and contentType required"));
    };

    let urls = state
        .media_storage
        .create_upload_url(&filename, &content_type)
        .await?;

    tracing::info!(%filename, %content_type, "Upload URL issued via handler");
    Ok(Json(urls))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        backend: state.backend.as_str(),
    })
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::RouteNotFound
}
