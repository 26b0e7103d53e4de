//! RSS feed fetcher with resource limits.
//!
//! This module fetches a feed over HTTP, enforces a payload limit while the
//! body streams in, parses the RSS 2.0 document and hands it to the
//! normalizer.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::AggregatorConfig;
use crate::error::{FetchError, GatorError, Result};
use crate::rss::normalizer::normalize_feed;
use crate::rss::store::FeedSource;
use crate::rss::types::{ParsedFeed, RawFeed, RawItem};

/// RSS feed fetcher.
///
/// Holds one pooled HTTP client; each call to [`FeedFetcher::fetch`] issues
/// a single GET with no internal retry.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    timeout: Duration,
    max_feed_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher from the aggregator settings.
    pub fn new(config: &AggregatorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Payload limit in bytes.
    pub fn max_feed_size(&self) -> u64 {
        self.max_feed_size
    }

    /// Fetch and parse a feed using the configured deadline.
    pub async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError> {
        self.fetch_with_timeout(url, self.timeout).await
    }

    /// Fetch and parse a feed with an explicit deadline.
    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<ParsedFeed, FetchError> {
        validate_url(url)?;
        debug!(url, "Fetching feed");

        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // Check content length if available
        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FetchError::TooLarge {
                    size: content_length,
                    limit: self.max_feed_size,
                });
            }
        }

        // Read body, checking the limit as chunks arrive
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_feed_size {
                return Err(FetchError::TooLarge {
                    size,
                    limit: self.max_feed_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let raw = parse_feed(&body)?;
        debug!(url, items = raw.items.len(), "Feed parsed");
        Ok(normalize_feed(raw))
    }
}

impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError> {
        FeedFetcher::fetch(self, url).await
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transport(format!("request timed out: {e}"))
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Validate a feed URL.
///
/// Only absolute http(s) URLs with a host are accepted.
pub fn validate_url(url: &str) -> std::result::Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(FetchError::InvalidUrl("URL has no host".to_string()));
    }

    Ok(())
}

/// Parse feed bytes into a raw channel document.
fn parse_feed(bytes: &[u8]) -> std::result::Result<RawFeed, FetchError> {
    let channel = rss::Channel::read_from(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let items = channel
        .items()
        .iter()
        .map(|item| RawItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
        })
        .collect();

    Ok(RawFeed {
        title: channel.title().to_string(),
        link: channel.link().to_string(),
        description: channel.description().to_string(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_valid_https() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_validate_url_valid_http() {
        assert!(validate_url("http://127.0.0.1:8080/feed.xml").is_ok());
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let err = validate_url("ftp://example.com/feed.xml").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_not_a_url() {
        let err = validate_url("not a url").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_fetcher_from_config() {
        let config = AggregatorConfig {
            request_timeout_secs: 3,
            max_feed_size_bytes: 1024,
            ..Default::default()
        };
        let fetcher = FeedFetcher::new(&config).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(3));
        assert_eq!(fetcher.max_feed_size(), 1024);
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url_without_network() {
        let fetcher = FeedFetcher::new(&AggregatorConfig::default()).unwrap();
        let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A test feed</description>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
      <pubDate>Tue, 09 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title, "Test Feed");
        assert_eq!(feed.link, "https://example.com");
        assert_eq!(feed.description, "A test feed");
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title, "First Article");
        assert_eq!(feed.items[0].link, "https://example.com/1");
        assert_eq!(feed.items[0].description, "<p>Description</p>");
        assert_eq!(feed.items[0].pub_date, "Tue, 09 Jan 2024 10:00:00 GMT");
        assert_eq!(feed.items[1].title, "Second Article");
        assert!(feed.items[1].pub_date.is_empty());
    }

    #[test]
    fn test_parse_feed_minimal() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Minimal</title>
    <link>https://example.com</link>
    <description></description>
    <item>
      <link>https://example.com/only-link</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title, "Minimal");
        assert_eq!(feed.items.len(), 1);
        assert!(feed.items[0].title.is_empty());
        assert_eq!(feed.items[0].link, "https://example.com/only-link");
    }

    #[test]
    fn test_parse_feed_invalid() {
        let err = parse_feed(b"This is not XML").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
