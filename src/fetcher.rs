use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser::{self, ParseFeedError};
use reqwest::Client;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

/// Anything that can hand back the raw body of a feed URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Every request is abandoned once `timeout` elapses.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("gator/0.1 (RSS Aggregator)")
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Extracts the channel title and the items, in document order.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseFeedError> {
    let parsed = parser::parse(bytes)?;

    let title = parsed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled Feed".to_string());

    let items = parsed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            link: entry.links.first().map(|l| l.href.clone()),
            published: entry.published.or(entry.updated),
        })
        .collect();

    Ok(ParsedFeed { title, items })
}
