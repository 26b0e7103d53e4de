//! Collaborator seams used by the ingestion pipeline.
//!
//! The pipeline only talks to storage, the network and the wall clock
//! through these traits, so a cycle can be driven entirely in memory.

use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{FetchError, Result};
use crate::rss::types::{CreatePostOutcome, Feed, NewPost, ParsedFeed};

/// Feed bookkeeping needed by the scheduler and pipeline.
pub trait FeedStore: Send + Sync {
    /// The stalest feed, or `None` when no feeds exist.
    fn next_feed_to_fetch(&self) -> impl Future<Output = Result<Option<Feed>>> + Send;

    /// Record that `feed_id` was polled at `at`.
    ///
    /// Must never move `last_fetched_at` backwards.
    fn mark_fetched(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Post persistence.
pub trait PostStore: Send + Sync {
    /// Store a post. A URL that is already present yields
    /// [`CreatePostOutcome::Duplicate`], not an error.
    fn create_post(
        &self,
        post: &NewPost,
    ) -> impl Future<Output = Result<CreatePostOutcome>> + Send;
}

/// Retrieves and parses a feed document.
pub trait FeedSource: Send + Sync {
    /// Fetch the feed at `url`.
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<ParsedFeed, FetchError>> + Send;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
