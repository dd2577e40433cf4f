use chrono::Utc;

use crate::db::{Database, Feed};
use crate::error::GatorError;
use crate::fetcher::{parse_feed, FeedSource, ParsedFeed};

/// Marks `feed` fetched, then downloads and parses it.
///
/// The timestamp is written first so that a feed whose fetch hangs or fails
/// still moves to the back of the queue.
pub async fn process_feed(
    db: &Database,
    source: &dyn FeedSource,
    feed: &Feed,
) -> Result<ParsedFeed, GatorError> {
    db.mark_feed_fetched(feed.id, Utc::now())
        .await?
        .ok_or_else(|| GatorError::FeedNotFound(feed.url.clone()))?;

    let body = source.fetch(&feed.url).await?;
    let parsed = parse_feed(&body)?;
    Ok(parsed)
}
