//! Repository for feeds, follows and posts.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{format_timestamp, is_unique_violation, parse_id, parse_timestamp, Database};
use crate::rss::store::{FeedStore, PostStore};
use crate::rss::types::{
    CreatePostOutcome, Feed, FeedFollow, FeedWithOwner, NewFeed, NewPost, Post, PostWithFeed,
};
use crate::{GatorError, Result};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

const POST_COLUMNS: &str =
    "id, feed_id, title, url, description, published_at, created_at, updated_at";

/// Row type for feeds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    user_id: String,
    last_fetched_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FeedRow> for Feed {
    type Error = GatorError;

    fn try_from(row: FeedRow) -> Result<Self> {
        Ok(Feed {
            id: parse_id(&row.id)?,
            name: row.name,
            url: row.url,
            user_id: parse_id(&row.user_id)?,
            last_fetched_at: row.last_fetched_at.as_deref().and_then(parse_timestamp),
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Row type for feeds joined with their owner.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedWithOwnerRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    owner_name: String,
}

/// Row type for follows joined with feed and user names.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedFollowRow {
    id: String,
    user_id: String,
    feed_id: String,
    feed_name: String,
    user_name: String,
    created_at: String,
}

impl TryFrom<FeedFollowRow> for FeedFollow {
    type Error = GatorError;

    fn try_from(row: FeedFollowRow) -> Result<Self> {
        Ok(FeedFollow {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            feed_id: parse_id(&row.feed_id)?,
            feed_name: row.feed_name,
            user_name: row.user_name,
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Row type for posts.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    url: String,
    description: Option<String>,
    published_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = GatorError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: parse_id(&row.id)?,
            feed_id: parse_id(&row.feed_id)?,
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: row.published_at.as_deref().and_then(parse_timestamp),
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Row type for posts joined with their feed name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostWithFeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    feed_name: String,
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new FeedRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Fails with a validation error if the URL is already registered.
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            name: new_feed.name.clone(),
            url: new_feed.url.clone(),
            user_id: new_feed.user_id,
            last_fetched_at: None,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            "INSERT INTO feeds (id, name, url, user_id, last_fetched_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(feed.id.to_string())
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id.to_string())
        .bind(format_timestamp(&feed.created_at))
        .bind(format_timestamp(&feed.updated_at))
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => Ok(feed),
            Err(e) if is_unique_violation(&e) => Err(GatorError::Validation(format!(
                "feed '{}' already exists",
                new_feed.url
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let sql = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?");
        let row = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let sql = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?");
        let row = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List all feeds with the name of the user who added them.
    pub async fn list_with_owner(&self) -> Result<Vec<FeedWithOwner>> {
        let rows = sqlx::query_as::<_, FeedWithOwnerRow>(
            "SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, f.created_at,
                    f.updated_at, u.name AS owner_name
             FROM feeds f
             JOIN users u ON u.id = f.user_id
             ORDER BY f.created_at ASC, f.id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedWithOwner {
                    feed: Feed::try_from(row.feed)?,
                    owner_name: row.owner_name,
                })
            })
            .collect()
    }

    /// The feed that should be polled next.
    ///
    /// Never-fetched feeds come first, then the oldest `last_fetched_at`.
    /// Ties break on creation time, then id.
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let sql = format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, FeedRow>(&sql)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Set `last_fetched_at` to `at`.
    ///
    /// Returns `false` when the feed is missing or already has a later
    /// timestamp, in which case nothing changes.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let at = format_timestamp(&at);
        let result = sqlx::query(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ?
             WHERE id = ? AND (last_fetched_at IS NULL OR last_fetched_at < ?)",
        )
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .bind(&at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new FeedFollowRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Follow a feed.
    ///
    /// Fails with a validation error if the user already follows it.
    pub async fn create(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let id = Uuid::new_v4();
        let now = format_timestamp(&Utc::now());

        let result = sqlx::query(
            "INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(feed_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(GatorError::Validation(
                    "already following this feed".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let row = sqlx::query_as::<_, FeedFollowRow>(
            "SELECT ff.id, ff.user_id, ff.feed_id, f.name AS feed_name,
                    u.name AS user_name, ff.created_at
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.id = ?",
        )
        .bind(id.to_string())
        .fetch_one(self.pool)
        .await?;

        FeedFollow::try_from(row)
    }

    /// List the follows of a user, oldest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(
            "SELECT ff.id, ff.user_id, ff.feed_id, f.name AS feed_name,
                    u.name AS user_name, ff.created_at
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.user_id = ?
             ORDER BY ff.created_at ASC, f.name ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(FeedFollow::try_from).collect()
    }

    /// Stop following the feed with the given URL.
    ///
    /// Returns whether a follow was removed.
    pub async fn delete_by_url(&self, user_id: Uuid, url: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM feed_follows
             WHERE user_id = ? AND feed_id = (SELECT id FROM feeds WHERE url = ?)",
        )
        .bind(user_id.to_string())
        .bind(url)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PostRepository<'a> {
    /// Create a new PostRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a post unless one with the same URL exists.
    ///
    /// Relies on the UNIQUE constraint on `posts.url` rather than a
    /// pre-check, so concurrent writers cannot both insert.
    pub async fn create(&self, new_post: &NewPost) -> Result<CreatePostOutcome> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            feed_id: new_post.feed_id,
            title: new_post.title.clone(),
            url: new_post.url.clone(),
            description: new_post.description.clone(),
            published_at: new_post.published_at,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            "INSERT INTO posts (id, feed_id, title, url, description, published_at,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id.to_string())
        .bind(post.feed_id.to_string())
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.as_ref().map(format_timestamp))
        .bind(format_timestamp(&post.created_at))
        .bind(format_timestamp(&post.updated_at))
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => Ok(CreatePostOutcome::Created(post)),
            Err(e) if is_unique_violation(&e) => Ok(CreatePostOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest posts from the feeds a user follows.
    ///
    /// Posts without a publication time sort last.
    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<PostWithFeed>> {
        let rows = sqlx::query_as::<_, PostWithFeedRow>(
            "SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                    p.created_at, p.updated_at, f.name AS feed_name
             FROM posts p
             JOIN feed_follows ff ON ff.feed_id = p.feed_id
             JOIN feeds f ON f.id = p.feed_id
             WHERE ff.user_id = ?
             ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC, p.id ASC
             LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PostWithFeed {
                    post: Post::try_from(row.post)?,
                    feed_name: row.feed_name,
                })
            })
            .collect()
    }

    /// List every post of one feed in insertion order.
    pub async fn list_by_feed(&self, feed_id: Uuid) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE feed_id = ? ORDER BY created_at ASC, url ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(feed_id.to_string())
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Total number of stored posts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

impl FeedStore for Database {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        FeedRepository::new(self.pool()).next_to_fetch().await
    }

    async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        FeedRepository::new(self.pool())
            .mark_fetched(feed_id, at)
            .await
            .map(|_| ())
    }
}

impl PostStore for Database {
    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome> {
        PostRepository::new(self.pool()).create(post).await
    }
}
