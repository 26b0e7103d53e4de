//! Test helpers for integration tests.
//!
//! Provides a fixture HTTP server that serves RSS documents, error statuses
//! and oversized bodies, plus database setup helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use gator::config::AggregatorConfig;
use gator::db::{User, UserRepository};
use gator::rss::{Feed, FeedRepository, NewFeed};
use gator::Database;

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of the body served at `/large`.
pub const LARGE_BODY_SIZE: usize = 64 * 1024;

#[derive(Clone, Default)]
struct FixtureState {
    feeds: Arc<Mutex<HashMap<String, String>>>,
    hits: Arc<AtomicUsize>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

/// In-process HTTP server serving fixture feeds on `127.0.0.1`.
pub struct FixtureServer {
    addr: SocketAddr,
    state: FixtureState,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = FixtureState::default();
        let app = Router::new()
            .route("/feeds/:name", get(serve_feed))
            .route("/status/:code", get(serve_status))
            .route("/large", get(serve_large))
            .route("/slow", get(serve_slow))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// URL of the feed named `name`.
    pub fn feed_url(&self, name: &str) -> String {
        self.url(&format!("/feeds/{name}"))
    }

    /// Serve `body` at `/feeds/{name}`.
    pub fn set_feed(&self, name: &str, body: impl Into<String>) {
        self.state
            .feeds
            .lock()
            .unwrap()
            .insert(name.to_string(), body.into());
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// User-Agent headers seen so far.
    pub fn user_agents(&self) -> Vec<String> {
        self.state.user_agents.lock().unwrap().clone()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn record(state: &FixtureState, headers: &HeaderMap) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        state.user_agents.lock().unwrap().push(agent.to_string());
    }
}

async fn serve_feed(
    State(state): State<FixtureState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&state, &headers);
    let body = state.feeds.lock().unwrap().get(&name).cloned();
    match body {
        Some(body) => ([(header::CONTENT_TYPE, "application/rss+xml")], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_status(
    State(state): State<FixtureState>,
    Path(code): Path<u16>,
    headers: HeaderMap,
) -> Response {
    record(&state, &headers);
    StatusCode::from_u16(code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

async fn serve_large(State(state): State<FixtureState>, headers: HeaderMap) -> Response {
    record(&state, &headers);
    "a".repeat(LARGE_BODY_SIZE).into_response()
}

async fn serve_slow(State(state): State<FixtureState>, headers: HeaderMap) -> Response {
    record(&state, &headers);
    tokio::time::sleep(Duration::from_secs(30)).await;
    StatusCode::OK.into_response()
}

/// An RSS item for [`rss_document`].
pub struct Item<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub pub_date: &'a str,
}

impl<'a> Item<'a> {
    /// Item with a title, link and date.
    pub fn new(title: &'a str, link: &'a str, pub_date: &'a str) -> Self {
        Self {
            title,
            link,
            description: "",
            pub_date,
        }
    }

    /// Set the raw description text (already escaped for XML).
    pub fn description(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }
}

/// Render an RSS 2.0 document. Text is inserted verbatim.
pub fn rss_document(title: &str, items: &[Item<'_>]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str("    <item>\n");
        body.push_str(&format!("      <title>{}</title>\n", item.title));
        body.push_str(&format!("      <link>{}</link>\n", item.link));
        if !item.description.is_empty() {
            body.push_str(&format!(
                "      <description>{}</description>\n",
                item.description
            ));
        }
        if !item.pub_date.is_empty() {
            body.push_str(&format!("      <pubDate>{}</pubDate>\n", item.pub_date));
        }
        body.push_str("    </item>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>https://example.com</link>
    <description>Fixture feed</description>
{body}  </channel>
</rss>"#
    )
}

/// Aggregator settings suitable for tests.
pub fn test_aggregator_config() -> AggregatorConfig {
    AggregatorConfig {
        request_timeout_secs: 2,
        connect_timeout_secs: 1,
        ..Default::default()
    }
}

/// Open an in-memory database with one user.
pub async fn setup_db() -> (Database, User) {
    let db = Database::open_in_memory().await.unwrap();
    let user = UserRepository::new(db.pool()).create("kahya").await.unwrap();
    (db, user)
}

/// Register a feed owned by `user`.
pub async fn add_feed(db: &Database, user: &User, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await
        .unwrap()
}

/// Reload a feed by id.
pub async fn reload_feed(db: &Database, feed: &Feed) -> Feed {
    FeedRepository::new(db.pool())
        .get_by_id(feed.id)
        .await
        .unwrap()
        .unwrap()
}
