//! RSS aggregation module for Gator.
//!
//! This module provides feed fetching, item normalization, feed rotation,
//! the ingestion pipeline and the background poll loop.

pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod repository;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod updater;

pub use fetcher::{validate_url, FeedFetcher};
pub use normalizer::{decode_entities, normalize_feed, parse_pub_date};
pub use pipeline::{CycleOutcome, IngestPipeline, IngestReport};
pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use scheduler::{compare_staleness, select_next, FeedScheduler};
pub use store::{Clock, FeedSource, FeedStore, ManualClock, PostStore, SystemClock};
pub use types::{
    CreatePostOutcome, Feed, FeedFollow, FeedWithOwner, NewFeed, NewPost, ParsedFeed, ParsedItem,
    Post, PostWithFeed, RawFeed, RawItem, MAX_FEED_SIZE,
};
pub use updater::PollLoop;
