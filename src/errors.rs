use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Post not found with ID: {0}")]
    PostNotFound(Uuid),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Could not presign upload: {0}")]
    PresignFailed(String),

    #[error("Object storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Route not found")]
    RouteNotFound,

    // Input validation / request parsing errors
    #[error("Validation failed: {0}")]
    Validation(&'static str),
    #[error("Invalid post ID: {0}")]
    InvalidPostId(#[from] uuid::Error),
    #[error("Malformed JSON body: {0}")]
    MalformedBody(#[from] JsonRejection),

    // Domain/Service level errors (mapped from RepoError/StorageError)
    #[error("Post not found with ID: {0}")]
    PostNotFound(Uuid),
    #[error("Could not access post data")]
    RepositoryError(#[source] RepoError),
    #[error("Could not perform media storage operation")]
    StorageError(#[source] StorageError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::PostNotFound(id) => AppError::PostNotFound(id),
            e @ RepoError::BackendError(_) => AppError::RepositoryError(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageError(err)
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
            }
            AppError::RouteNotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            AppError::InvalidPostId(_) => (StatusCode::BAD_REQUEST, "invalid postId".to_string()),
            AppError::MalformedBody(rejection) => {
                tracing::debug!(error = %rejection, "Rejected request body");
                (StatusCode::BAD_REQUEST, "invalid request body".to_string())
            }
            AppError::PostNotFound(_) => (StatusCode::NOT_FOUND, "post not found".to_string()),

            // 5xx Server Errors
            AppError::RepositoryError(e) => {
                tracing::error!(error.source = ?e, "Repository error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database operation failed".to_string())
            }
            AppError::StorageError(e) => {
                tracing::error!(error.source = ?e, "Storage error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Media storage operation failed".to_string())
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server initialization error".to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(error.message = %error_message, error.detail = %self, "Responding with error");
        } else {
            tracing::debug!(error.message = %error_message, error.status = %status, "Responding with client error");
        }

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}
