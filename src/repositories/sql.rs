use crate::{
    domain::PostRepository,
    errors::RepoError,
    models::{Comment, NewPost, Post},
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

/// Captions stored in the relational tables are capped at this many characters.
pub const SQL_CAPTION_MAX_CHARS: usize = 280;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

#[derive(Debug, Clone)]
pub struct SqlPostRepository {
    pool: SqlitePool,
}

impl SqlPostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        info!("Initializing SqlPostRepository");
        Self { pool }
    }

    /// Creates the `posts`, `likes` and `comments` tables if they are missing.
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("SQL: Applying {} schema statements", statements.len());
        for stmt in statements {
            tracing::debug!("SQL: Executing schema statement: {}", stmt);
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("SQL: Failed to apply schema statement `{}`", stmt))?;
        }
        Ok(())
    }

    async fn comments_for(&self, post_ids: &[Uuid]) -> Result<Vec<Comment>, RepoError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT post_id, author, text, created_at FROM comments WHERE post_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in post_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY created_at ASC, id ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("SQL: Failed to load comments for feed")
            .map_err(RepoError::BackendError)?;

        rows.iter().map(row_to_comment).collect()
    }
}

#[async_trait]
impl PostRepository for SqlPostRepository {
    /// Inserts a row into `posts`.
    async fn create(&self, new_post: NewPost) -> Result<Post, RepoError> {
        let post = new_post.into_post(SQL_CAPTION_MAX_CHARS);

        sqlx::query(
            "INSERT INTO posts (id, author, caption, media_url, media_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id.to_string())
        .bind(&post.author)
        .bind(&post.caption)
        .bind(&post.media_url)
        .bind(&post.media_type)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .context(format!("SQL: Failed to insert post (id: {})", post.id))
        .map_err(RepoError::BackendError)?;

        tracing::debug!(post_id = %post.id, "SQL: Post inserted");
        Ok(post)
    }

    /// Newest posts with aggregated like counts, then their comments in one query.
    async fn feed(&self, limit: usize) -> Result<Vec<Post>, RepoError> {
        let rows = sqlx::query(
            "SELECT p.id, p.author, p.caption, p.media_url, p.media_type, p.created_at, \
                    COALESCE(l.cnt, 0) AS likes_count \
             FROM posts p \
             LEFT JOIN (SELECT post_id, COUNT(*) AS cnt FROM likes GROUP BY post_id) l \
                    ON l.post_id = p.id \
             ORDER BY p.created_at DESC, p.rowid DESC \
             LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("SQL: Failed to load feed posts")
        .map_err(RepoError::BackendError)?;

        let mut posts = rows
            .iter()
            .map(row_to_post)
            .collect::<Result<Vec<_>, _>>()?;
        if posts.is_empty() {
            return Ok(posts);
        }

        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut by_post: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for comment in self.comments_for(&ids).await? {
            by_post.entry(comment.post_id).or_default().push(comment);
        }
        for post in &mut posts {
            if let Some(comments) = by_post.remove(&post.id) {
                post.comments = comments;
            }
        }

        tracing::debug!("SQL: Loaded {} feed posts", posts.len());
        Ok(posts)
    }

    /// Insert-or-ignore keyed on `(post_id, session_id)`. Does not check the post exists.
    async fn like(&self, post_id: Uuid, session_id: &str) -> Result<(), RepoError> {
        let result = sqlx::query(
            "INSERT INTO likes (post_id, session_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (post_id, session_id) DO NOTHING",
        )
        .bind(post_id.to_string())
        .bind(session_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context(format!("SQL: Failed to record like (post id: {})", post_id))
        .map_err(RepoError::BackendError)?;

        if result.rows_affected() == 0 {
            tracing::debug!(post_id = %post_id, "SQL: Duplicate like ignored");
        }
        Ok(())
    }

    /// Unconditional insert; comments on unknown posts are kept as orphans.
    async fn add_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO comments (post_id, author, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comment.post_id.to_string())
        .bind(&comment.author)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .context(format!("SQL: Failed to insert comment (post id: {})", comment.post_id))
        .map_err(RepoError::BackendError)?;
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(raw)
        .with_context(|| format!("SQL: Stored id `{}` is not a UUID", raw))
        .map_err(RepoError::BackendError)
}

fn row_to_post(row: &SqliteRow) -> Result<Post, RepoError> {
    let decode = || -> Result<_, sqlx::Error> {
        Ok((
            row.try_get::<String, _>("id")?,
            row.try_get::<String, _>("author")?,
            row.try_get::<String, _>("caption")?,
            row.try_get::<String, _>("media_url")?,
            row.try_get::<String, _>("media_type")?,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<i64, _>("likes_count")?,
        ))
    };
    let (id, author, caption, media_url, media_type, created_at, likes_count) = decode()
        .context("SQL: Failed to decode post row")
        .map_err(RepoError::BackendError)?;

    Ok(Post {
        id: parse_id(&id)?,
        author,
        caption,
        media_url,
        media_type,
        created_at,
        likes_count: u64::try_from(likes_count).unwrap_or_default(),
        comments: Vec::new(),
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, RepoError> {
    let decode = || -> Result<_, sqlx::Error> {
        Ok((
            row.try_get::<String, _>("post_id")?,
            row.try_get::<String, _>("author")?,
            row.try_get::<String, _>("text")?,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
        ))
    };
    let (post_id, author, text, created_at) = decode()
        .context("SQL: Failed to decode comment row")
        .map_err(RepoError::BackendError)?;

    Ok(Comment {
        post_id: parse_id(&post_id)?,
        author,
        text,
        created_at,
    })
}
