//! RSS types for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Feed URL (unique).
    pub url: String,
    /// User who added the feed.
    pub user_id: Uuid,
    /// Last time the feed was polled; `None` means never.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Owning user.
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id,
        }
    }
}

/// Feed joined with the name of the user who added it.
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    /// The feed.
    pub feed: Feed,
    /// Owner's user name.
    pub owner_name: String,
}

/// A user's subscription to a feed.
#[derive(Debug, Clone)]
pub struct FeedFollow {
    /// Follow ID.
    pub id: Uuid,
    /// Following user.
    pub user_id: Uuid,
    /// Followed feed.
    pub feed_id: Uuid,
    /// Followed feed's name.
    pub feed_name: String,
    /// Following user's name.
    pub user_name: String,
    /// When the follow was created.
    pub created_at: DateTime<Utc>,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Post ID.
    pub id: Uuid,
    /// Feed the post came from.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Canonical URL (unique across all posts).
    pub url: String,
    /// Description, if the item had a non-empty one.
    pub description: Option<String>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New post for creation.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Parent feed.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Canonical URL.
    pub url: String,
    /// Description.
    pub description: Option<String>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Create a new post.
    pub fn new(feed_id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at: None,
        }
    }

    /// Set the description. Blank descriptions are stored as absent.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        self.description = if desc.trim().is_empty() {
            None
        } else {
            Some(desc)
        };
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Result of attempting to store a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatePostOutcome {
    /// The post was new and has been stored.
    Created(Post),
    /// A post with the same URL already exists.
    Duplicate,
}

/// Post joined with the name of its feed.
#[derive(Debug, Clone)]
pub struct PostWithFeed {
    /// The post.
    pub post: Post,
    /// Name of the feed it came from.
    pub feed_name: String,
}

/// Channel as read from the wire, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawFeed {
    /// Channel title.
    pub title: String,
    /// Channel link.
    pub link: String,
    /// Channel description.
    pub description: String,
    /// Items in document order.
    pub items: Vec<RawItem>,
}

/// Item as read from the wire, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    /// Item title.
    pub title: String,
    /// Item link.
    pub link: String,
    /// Item description.
    pub description: String,
    /// Unparsed `pubDate` text.
    pub pub_date: String,
}

/// Normalized feed document returned by the fetcher.
///
/// Lives only for the duration of one ingestion cycle.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Channel title (entities decoded).
    pub title: String,
    /// Channel link.
    pub link: String,
    /// Channel description (entities decoded).
    pub description: String,
    /// Items in document order.
    pub items: Vec<ParsedItem>,
}

/// Normalized item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    /// Item title (entities decoded).
    pub title: String,
    /// Item link, the post's de-duplication key.
    pub link: String,
    /// Item description (entities decoded).
    pub description: String,
    /// Original `pubDate` text, kept for diagnostics.
    pub pub_date: String,
    /// Resolved publication time; `None` when no known format matched.
    pub published_at: Option<DateTime<Utc>>,
}
