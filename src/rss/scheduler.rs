//! Feed rotation.
//!
//! One feed is polled per tick. Feeds that were never polled go first,
//! then the one whose `last_fetched_at` is oldest, so every feed is
//! revisited and a freshly polled feed drops to the back of the queue.

use std::cmp::Ordering;

use tracing::debug;

use crate::rss::store::FeedStore;
use crate::rss::types::Feed;
use crate::Result;

/// Order two feeds by how overdue they are; the stalest sorts first.
pub fn compare_staleness(a: &Feed, b: &Feed) -> Ordering {
    let by_fetch = match (a.last_fetched_at, b.last_fetched_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    };

    by_fetch
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Pick the feed to poll next from an in-memory set.
pub fn select_next(feeds: &[Feed]) -> Option<&Feed> {
    feeds.iter().min_by(|a, b| compare_staleness(a, b))
}

/// Asks a [`FeedStore`] which feed to poll next.
pub struct FeedScheduler<'a, S> {
    store: &'a S,
}

impl<'a, S: FeedStore> FeedScheduler<'a, S> {
    /// Create a scheduler over `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The next feed to poll, or `None` when there is nothing to do.
    pub async fn next(&self) -> Result<Option<Feed>> {
        let feed = self.store.next_feed_to_fetch().await?;
        match &feed {
            Some(feed) => debug!(feed_id = %feed.id, url = %feed.url, "Selected feed"),
            None => debug!("No feeds to fetch"),
        }
        Ok(feed)
    }
}
