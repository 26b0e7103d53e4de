//! Ingestion pipeline.
//!
//! One call to [`IngestPipeline::run_cycle`] is one tick: pick the stalest
//! feed, fetch it, store every unseen item and mark the feed as polled.
//! Duplicates and per-item failures never abort a cycle.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::FetchError;
use crate::rss::scheduler::FeedScheduler;
use crate::rss::store::{Clock, FeedSource, FeedStore, PostStore, SystemClock};
use crate::rss::types::{CreatePostOutcome, Feed, NewPost, ParsedFeed};
use crate::Result;

/// Per-feed counts from one ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Feed that was ingested.
    pub feed_id: Uuid,
    /// Items stored as new posts.
    pub created: usize,
    /// Items whose URL was already stored.
    pub duplicates: usize,
    /// Items without a link.
    pub skipped: usize,
    /// Items the store failed to persist.
    pub failed: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No feeds are registered.
    Idle,
    /// The selected feed could not be retrieved.
    FetchFailed { feed_id: Uuid, error: FetchError },
    /// The selected feed was fetched and its items processed.
    Ingested(IngestReport),
}

/// Fetch-and-store orchestration over pluggable collaborators.
pub struct IngestPipeline<S, F, C = SystemClock> {
    store: S,
    source: F,
    clock: C,
    mark_fetched_on_failure: bool,
}

impl<S, F> IngestPipeline<S, F, SystemClock>
where
    S: FeedStore + PostStore,
    F: FeedSource,
{
    /// Create a pipeline using the wall clock.
    pub fn new(store: S, source: F) -> Self {
        Self::with_clock(store, source, SystemClock)
    }
}

impl<S, F, C> IngestPipeline<S, F, C>
where
    S: FeedStore + PostStore,
    F: FeedSource,
    C: Clock,
{
    /// Create a pipeline with an explicit clock.
    pub fn with_clock(store: S, source: F, clock: C) -> Self {
        Self {
            store,
            source,
            clock,
            mark_fetched_on_failure: false,
        }
    }

    /// Advance `last_fetched_at` even when the fetch fails.
    pub fn mark_fetched_on_failure(mut self, enabled: bool) -> Self {
        self.mark_fetched_on_failure = enabled;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The feed source.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run one tick against the stalest feed.
    ///
    /// Fetch failures are reported in the outcome. An `Err` means the store
    /// itself failed while selecting or marking the feed.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Some(feed) = FeedScheduler::new(&self.store).next().await? else {
            return Ok(CycleOutcome::Idle);
        };

        info!(feed = %feed.name, url = %feed.url, "Fetching feed");

        let document = match self.source.fetch(&feed.url).await {
            Ok(document) => document,
            Err(error) => {
                warn!(feed_id = %feed.id, url = %feed.url, "Failed to fetch feed: {}", error);
                if self.mark_fetched_on_failure {
                    self.store.mark_fetched(feed.id, self.clock.now()).await?;
                }
                return Ok(CycleOutcome::FetchFailed {
                    feed_id: feed.id,
                    error,
                });
            }
        };

        let now = self.clock.now();
        let report = self.ingest(&feed, document, now).await;
        self.store.mark_fetched(feed.id, now).await?;

        if report.created > 0 {
            info!(
                url = %feed.url,
                "Feed updated: {} new post(s), {} already stored",
                report.created, report.duplicates
            );
        } else {
            debug!(url = %feed.url, "Feed updated: no new posts");
        }

        Ok(CycleOutcome::Ingested(report))
    }

    /// Store the items of `document` as posts of `feed`, in document order.
    ///
    /// Items without a usable date are stamped with `now`.
    pub async fn ingest(
        &self,
        feed: &Feed,
        document: ParsedFeed,
        now: DateTime<Utc>,
    ) -> IngestReport {
        let mut report = IngestReport {
            feed_id: feed.id,
            ..Default::default()
        };

        for item in document.items {
            if item.link.is_empty() {
                warn!(url = %feed.url, title = %item.title, "Skipping item without link");
                report.skipped += 1;
                continue;
            }

            let published_at = item.published_at.unwrap_or_else(|| {
                warn!(
                    link = %item.link,
                    raw = %item.pub_date,
                    "Unrecognized publication date, using current time"
                );
                now
            });

            let new_post = NewPost::new(feed.id, item.title, item.link)
                .with_description(item.description)
                .with_published_at(published_at);

            match self.store.create_post(&new_post).await {
                Ok(CreatePostOutcome::Created(_)) => report.created += 1,
                Ok(CreatePostOutcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    error!(link = %new_post.url, "Failed to store post: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rss::scheduler::select_next;
    use crate::rss::store::ManualClock;
    use crate::rss::types::{ParsedItem, Post};
    use crate::GatorError;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory feed and post store.
    #[derive(Default)]
    struct MemoryStore {
        feeds: Mutex<Vec<Feed>>,
        posts: Mutex<Vec<Post>>,
        failing_urls: Vec<String>,
    }

    impl MemoryStore {
        fn add_feed(&self, name: &str, url: &str, created_at: DateTime<Utc>) -> Feed {
            let feed = Feed {
                id: Uuid::new_v4(),
                name: name.to_string(),
                url: url.to_string(),
                user_id: Uuid::new_v4(),
                last_fetched_at: None,
                created_at,
                updated_at: created_at,
            };
            self.feeds.lock().unwrap().push(feed.clone());
            feed
        }

        fn feed(&self, id: Uuid) -> Feed {
            self.feeds
                .lock()
                .unwrap()
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .unwrap()
        }

        fn posts(&self) -> Vec<Post> {
            self.posts.lock().unwrap().clone()
        }
    }

    impl FeedStore for MemoryStore {
        async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
            let feeds = self.feeds.lock().unwrap();
            Ok(select_next(&feeds).cloned())
        }

        async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
            let mut feeds = self.feeds.lock().unwrap();
            if let Some(feed) = feeds.iter_mut().find(|f| f.id == feed_id) {
                if feed.last_fetched_at.map_or(true, |prev| prev < at) {
                    feed.last_fetched_at = Some(at);
                }
            }
            Ok(())
        }
    }

    impl PostStore for MemoryStore {
        async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome> {
            if self.failing_urls.contains(&post.url) {
                return Err(GatorError::Database("disk I/O error".to_string()));
            }
            let mut posts = self.posts.lock().unwrap();
            if posts.iter().any(|p| p.url == post.url) {
                return Ok(CreatePostOutcome::Duplicate);
            }
            let now = Utc::now();
            let stored = Post {
                id: Uuid::new_v4(),
                feed_id: post.feed_id,
                title: post.title.clone(),
                url: post.url.clone(),
                description: post.description.clone(),
                published_at: post.published_at,
                created_at: now,
                updated_at: now,
            };
            posts.push(stored.clone());
            Ok(CreatePostOutcome::Created(stored))
        }
    }

    /// Feed source answering from a fixed table.
    #[derive(Default)]
    struct FakeSource {
        responses: Mutex<HashMap<String, std::result::Result<ParsedFeed, FetchError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn respond(&self, url: &str, response: std::result::Result<ParsedFeed, FetchError>) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), response);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FeedSource for FakeSource {
        async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Status(404)))
        }
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 9, hour, 0, 0).unwrap()
    }

    fn item(link: &str, pub_date: &str, published_at: Option<DateTime<Utc>>) -> ParsedItem {
        ParsedItem {
            title: format!("Title of {link}"),
            link: link.to_string(),
            description: String::new(),
            pub_date: pub_date.to_string(),
            published_at,
        }
    }

    fn document(items: Vec<ParsedItem>) -> ParsedFeed {
        ParsedFeed {
            title: "Feed".to_string(),
            link: "https://example.com".to_string(),
            description: String::new(),
            items,
        }
    }

    fn pipeline(store: MemoryStore) -> IngestPipeline<MemoryStore, FakeSource, ManualClock> {
        IngestPipeline::with_clock(store, FakeSource::default(), ManualClock::new(ts(12)))
    }

    #[tokio::test]
    async fn test_no_feeds_is_idle() {
        let pipeline = pipeline(MemoryStore::default());
        assert_eq!(pipeline.run_cycle().await.unwrap(), CycleOutcome::Idle);
        assert!(pipeline.source().calls().is_empty());
    }

    #[tokio::test]
    async fn test_never_fetched_feed_is_ingested() {
        let store = MemoryStore::default();
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        pipeline.source().respond(
            "https://a.example/rss",
            Ok(document(vec![
                item("https://a.example/1", "Tue, 09 Jan 2024 10:00:00 GMT", Some(ts(10))),
                item("https://a.example/2", "Tue, 09 Jan 2024 11:00:00 GMT", Some(ts(11))),
            ])),
        );

        let outcome = pipeline.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Ingested(IngestReport {
                feed_id: feed.id,
                created: 2,
                ..Default::default()
            })
        );
        assert_eq!(pipeline.store().feed(feed.id).last_fetched_at, Some(ts(12)));
        let posts = pipeline.store().posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].url, "https://a.example/1");
        assert_eq!(posts[0].published_at, Some(ts(10)));
        assert!(posts[0].description.is_none());
    }

    #[tokio::test]
    async fn test_reingesting_same_document_is_idempotent() {
        let store = MemoryStore::default();
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        let doc = document(vec![
            item("https://a.example/1", "", Some(ts(10))),
            item("https://a.example/2", "", Some(ts(11))),
        ]);

        let first = pipeline.ingest(&feed, doc.clone(), ts(12)).await;
        let stored_once = pipeline.store().posts();
        let second = pipeline.ingest(&feed, doc, ts(13)).await;
        let stored_twice = pipeline.store().posts();

        assert_eq!(first.created, 2);
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(stored_once, stored_twice);
    }

    #[tokio::test]
    async fn test_unchanged_upstream_adds_nothing_but_advances_timestamp() {
        let store = MemoryStore::default();
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        pipeline.source().respond(
            "https://a.example/rss",
            Ok(document(vec![item("https://a.example/1", "", Some(ts(10)))])),
        );

        pipeline.run_cycle().await.unwrap();
        let first_fetch = pipeline.store().feed(feed.id).last_fetched_at.unwrap();

        pipeline.clock().advance(Duration::seconds(30));
        let outcome = pipeline.run_cycle().await.unwrap();

        let CycleOutcome::Ingested(report) = outcome else {
            panic!("expected ingestion, got {outcome:?}");
        };
        assert_eq!(report.created, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(pipeline.store().posts().len(), 1);
        let second_fetch = pipeline.store().feed(feed.id).last_fetched_at.unwrap();
        assert!(second_fetch > first_fetch);
    }

    #[tokio::test]
    async fn test_http_error_leaves_feed_untouched() {
        let store = MemoryStore::default();
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        pipeline
            .source()
            .respond("https://a.example/rss", Err(FetchError::Status(500)));

        let outcome = pipeline.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::FetchFailed {
                feed_id: feed.id,
                error: FetchError::Status(500),
            }
        );
        assert!(pipeline.store().posts().is_empty());
        assert!(pipeline.store().feed(feed.id).last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_mark_fetched_on_failure() {
        let store = MemoryStore::default();
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store).mark_fetched_on_failure(true);
        pipeline.source().respond(
            "https://a.example/rss",
            Err(FetchError::Transport("connection reset".to_string())),
        );

        let outcome = pipeline.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::FetchFailed { .. }));
        assert_eq!(pipeline.store().feed(feed.id).last_fetched_at, Some(ts(12)));
    }

    #[tokio::test]
    async fn test_unparsable_date_falls_back_to_cycle_time() {
        let store = MemoryStore::default();
        store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        pipeline.source().respond(
            "https://a.example/rss",
            Ok(document(vec![item("https://a.example/1", "not-a-date", None)])),
        );

        pipeline.run_cycle().await.unwrap();

        let posts = pipeline.store().posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].published_at, Some(ts(12)));
    }

    #[tokio::test]
    async fn test_missing_links_and_store_failures_do_not_abort() {
        let store = MemoryStore {
            failing_urls: vec!["https://a.example/broken".to_string()],
            ..Default::default()
        };
        let feed = store.add_feed("A", "https://a.example/rss", ts(1));
        let pipeline = pipeline(store);
        let doc = document(vec![
            item("", "", Some(ts(9))),
            item("https://a.example/broken", "", Some(ts(10))),
            item("https://a.example/ok", "", Some(ts(11))),
        ]);

        let report = pipeline.ingest(&feed, doc, ts(12)).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
        assert_eq!(pipeline.store().posts().len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_advances_stalest_feed_each_cycle() {
        let store = MemoryStore::default();
        let urls = [
            "https://a.example/rss",
            "https://b.example/rss",
            "https://c.example/rss",
        ];
        let feeds: Vec<Feed> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| store.add_feed(url, url, ts(i as u32)))
            .collect();
        let pipeline = pipeline(store);
        for url in urls {
            pipeline.source().respond(url, Ok(document(vec![])));
        }

        for cycle in 0..9 {
            let before: Vec<Feed> = feeds.iter().map(|f| pipeline.store().feed(f.id)).collect();
            let expected = select_next(&before).unwrap().id;

            pipeline.clock().advance(Duration::minutes(1));
            pipeline.run_cycle().await.unwrap();

            let after: Vec<Feed> = feeds.iter().map(|f| pipeline.store().feed(f.id)).collect();
            let advanced: Vec<Uuid> = before
                .iter()
                .zip(&after)
                .filter(|(b, a)| b.last_fetched_at != a.last_fetched_at)
                .map(|(_, a)| a.id)
                .collect();
            assert_eq!(advanced, vec![expected], "cycle {cycle}");
        }

        let calls = pipeline.source().calls();
        assert_eq!(&calls[..3], &urls[..]);
        assert_eq!(&calls[3..6], &urls[..]);
    }
}
