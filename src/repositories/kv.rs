//! Redis-backed post store.
//!
//! Each post is split into independent keys so that likes and comments are
//! single atomic commands instead of read-modify-write cycles on one blob:
//!
//! - `posts:timeline` sorted set of post ids, scored by `posts:seq`
//! - `posts:seq` counter incremented once per post, so equal timestamps
//!   still sort in insertion order
//! - `post:{id}` JSON of the immutable post fields
//! - `post:{id}:likes` set of session ids
//! - `post:{id}:comments` list of JSON comments, appended with RPUSH

use crate::{
    domain::PostRepository,
    errors::RepoError,
    models::{Comment, NewPost, Post},
};
use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Value};
use tracing::{self, info};
use uuid::Uuid;

/// Captions stored as key-value records are capped at this many characters.
pub const KV_CAPTION_MAX_CHARS: usize = 512;

pub const TIMELINE_KEY: &str = "posts:timeline";
pub const SEQUENCE_KEY: &str = "posts:seq";

pub fn post_key(id: &Uuid) -> String {
    format!("post:{}", id)
}

pub fn likes_key(id: &Uuid) -> String {
    format!("post:{}:likes", id)
}

pub fn comments_key(id: &Uuid) -> String {
    format!("post:{}:comments", id)
}

#[derive(Clone)]
pub struct RedisPostRepository {
    conn: ConnectionManager,
}

impl RedisPostRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        info!("Initializing RedisPostRepository");
        Self { conn }
    }

    async fn ensure_post_exists(&self, id: Uuid) -> Result<(), RepoError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(post_key(&id))
            .await
            .context(format!("Redis: Failed to check post (id: {})", id))
            .map_err(RepoError::BackendError)?;

        if exists {
            Ok(())
        } else {
            tracing::debug!(post_id = %id, "Redis: Post not found");
            Err(RepoError::PostNotFound(id))
        }
    }
}

#[async_trait]
impl PostRepository for RedisPostRepository {
    /// Takes the next timeline position, then writes the post record and its
    /// timeline entry in one MULTI/EXEC.
    async fn create(&self, new_post: NewPost) -> Result<Post, RepoError> {
        let post = new_post.into_post(KV_CAPTION_MAX_CHARS);
        let record = serde_json::to_string(&post)
            .context(format!("Redis: Failed to serialize post (id: {})", post.id))
            .map_err(RepoError::BackendError)?;

        let mut conn = self.conn.clone();
        let position: i64 = conn
            .incr(SEQUENCE_KEY, 1)
            .await
            .context(format!("Redis: Failed to allocate timeline position (id: {})", post.id))
            .map_err(RepoError::BackendError)?;

        redis::pipe()
            .atomic()
            .set(post_key(&post.id), record)
            .ignore()
            .zadd(TIMELINE_KEY, post.id.to_string(), position)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .context(format!("Redis: Failed to store post (id: {})", post.id))
            .map_err(RepoError::BackendError)?;

        tracing::debug!(post_id = %post.id, "Redis: Post stored");
        Ok(post)
    }

    /// Reads the newest ids from the timeline, then every record, like count
    /// and comment list in one pipeline.
    async fn feed(&self, limit: usize) -> Result<Vec<Post>, RepoError> {
        let Some(stop) = timeline_stop(limit) else {
            return Ok(Vec::new());
        };

        let mut conn = self.conn.clone();
        let raw_ids: Vec<String> = conn
            .zrevrange(TIMELINE_KEY, 0, stop)
            .await
            .context("Redis: Failed to read timeline")
            .map_err(RepoError::BackendError)?;

        let ids = raw_ids
            .iter()
            .map(|raw| {
                Uuid::parse_str(raw)
                    .with_context(|| format!("Redis: Timeline member `{}` is not a UUID", raw))
                    .map_err(RepoError::BackendError)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.get(post_key(id))
                .scard(likes_key(id))
                .lrange(comments_key(id), 0, -1);
        }
        let replies: Vec<Value> = pipe
            .query_async(&mut conn)
            .await
            .context("Redis: Failed to load feed posts")
            .map_err(RepoError::BackendError)?;

        let mut posts = Vec::with_capacity(ids.len());
        for (id, reply) in ids.iter().zip(replies.chunks(3)) {
            match assemble_post(id, reply)? {
                Some(post) => posts.push(post),
                None => {
                    tracing::warn!(post_id = %id, "Redis: Timeline references a missing post record")
                }
            }
        }

        tracing::debug!("Redis: Loaded {} feed posts", posts.len());
        Ok(posts)
    }

    /// SADD of the session id; the set makes repeated likes no-ops.
    async fn like(&self, post_id: Uuid, session_id: &str) -> Result<(), RepoError> {
        self.ensure_post_exists(post_id).await?;

        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(likes_key(&post_id), session_id)
            .await
            .context(format!("Redis: Failed to record like (post id: {})", post_id))
            .map_err(RepoError::BackendError)?;

        if added == 0 {
            tracing::debug!(post_id = %post_id, "Redis: Duplicate like ignored");
        }
        Ok(())
    }

    /// RPUSH onto the post's comment list. Unknown posts are rejected.
    async fn add_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        self.ensure_post_exists(comment.post_id).await?;

        let record = serde_json::to_string(comment)
            .context("Redis: Failed to serialize comment")
            .map_err(RepoError::BackendError)?;

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .rpush(comments_key(&comment.post_id), record)
            .await
            .context(format!("Redis: Failed to append comment (post id: {})", comment.post_id))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }
}

// Inclusive ZREVRANGE stop index for the newest `limit` members.
// `None` for a zero limit, since a stop of -1 would mean the whole set.
fn timeline_stop(limit: usize) -> Option<isize> {
    if limit == 0 {
        return None;
    }
    Some(isize::try_from(limit).unwrap_or(isize::MAX) - 1)
}

// Rebuilds a post from its `GET`, `SCARD` and `LRANGE` replies.
// Returns `None` when the record key is missing.
fn assemble_post(id: &Uuid, reply: &[Value]) -> Result<Option<Post>, RepoError> {
    let [record, likes, comments] = reply else {
        return Err(RepoError::BackendError(anyhow::anyhow!(
            "Redis: Expected 3 replies for post {}, got {}",
            id,
            reply.len()
        )));
    };

    let record: Option<String> = redis::from_redis_value(record)
        .context("Redis: Unexpected reply for post record")
        .map_err(RepoError::BackendError)?;
    let Some(record) = record else {
        return Ok(None);
    };
    let likes_count: u64 = redis::from_redis_value(likes)
        .context("Redis: Unexpected reply for like count")
        .map_err(RepoError::BackendError)?;
    let raw_comments: Vec<String> = redis::from_redis_value(comments)
        .context("Redis: Unexpected reply for comment list")
        .map_err(RepoError::BackendError)?;

    let mut post: Post = serde_json::from_str(&record)
        .with_context(|| format!("Redis: Failed to parse post record (id: {})", id))
        .map_err(RepoError::BackendError)?;
    post.likes_count = likes_count;
    post.comments = raw_comments
        .iter()
        .map(|raw| {
            serde_json::from_str::<Comment>(raw)
                .with_context(|| format!("Redis: Failed to parse comment (post id: {})", id))
                .map_err(RepoError::BackendError)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(post))
}
