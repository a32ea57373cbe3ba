use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUTHOR_MAX_CHARS: usize = 64;
pub const COMMENT_TEXT_MAX_CHARS: usize = 500;
pub const DEFAULT_AUTHOR: &str = "guest";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub author: String,
    pub caption: String,
    pub media_url: String,
    pub media_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub post_id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new post. Media fields are guaranteed non-empty.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: Option<String>,
    pub caption: Option<String>,
    pub media_url: String,
    pub media_type: String,
}

impl NewPost {
    /// Assigns id and timestamp, applies defaults and trims author/caption.
    /// The caption limit depends on the backend storing the post.
    pub fn into_post(self, caption_max_chars: usize) -> Post {
        let author = self
            .author
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        let caption = self.caption.unwrap_or_default();

        Post {
            id: Uuid::new_v4(),
            author: truncate_chars(&author, AUTHOR_MAX_CHARS),
            caption: truncate_chars(&caption, caption_max_chars),
            media_url: self.media_url,
            media_type: self.media_type,
            created_at: Utc::now(),
            likes_count: 0,
            comments: Vec::new(),
        }
    }
}

impl Comment {
    pub fn new(post_id: Uuid, author: &str, text: &str) -> Self {
        Self {
            post_id,
            author: truncate_chars(author, AUTHOR_MAX_CHARS),
            text: truncate_chars(text, COMMENT_TEXT_MAX_CHARS),
            created_at: Utc::now(),
        }
    }
}

/// Pair of URLs handed out for a direct client upload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrls {
    pub upload_url: String,
    pub blob_url: String,
}

// --- Request bodies ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPostRequest {
    pub author: Option<String>,
    pub caption: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub post_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub post_id: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Cuts `value` down to at most `max` characters without splitting one.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}
