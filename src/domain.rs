use crate::errors::{RepoError, StorageError};
use crate::models::{Comment, NewPost, Post, UploadUrls};
use async_trait::async_trait;
use uuid::Uuid;

/// Operations shared by every post store.
#[async_trait]
pub trait PostRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Persists a new post and returns the stored record.
    async fn create(&self, new_post: NewPost) -> Result<Post, RepoError>;

    /// Returns at most `limit` posts, newest first, each with its like count
    /// and its comments oldest first.
    async fn feed(&self, limit: usize) -> Result<Vec<Post>, RepoError>;

    /// Records a like from `session_id`. Repeating the same pair is a no-op.
    async fn like(&self, post_id: Uuid, session_id: &str) -> Result<(), RepoError>;

    /// Appends a comment to its post.
    async fn add_comment(&self, comment: &Comment) -> Result<(), RepoError>;
}

/// Object storage that clients upload media into directly.
#[async_trait]
pub trait MediaStorage: Send + Sync + 'static {
    /// Allocates an object key and returns the upload and public URLs for it.
    async fn create_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadUrls, StorageError>;
}
