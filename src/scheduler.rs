use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command::Output;
use crate::db::{Database, Feed};
use crate::error::GatorError;
use crate::fetcher::{FeedSource, ParsedFeed};
use crate::processor::process_feed;

/// Parses a polling interval such as `30s`, `1m` or `1h 30m`.
pub fn parse_interval(input: &str) -> Result<Duration, GatorError> {
    let interval =
        humantime::parse_duration(input).map_err(|err| GatorError::InvalidDuration {
            input: input.to_string(),
            reason: err.to_string(),
        })?;

    if interval.is_zero() {
        return Err(GatorError::InvalidDuration {
            input: input.to_string(),
            reason: "interval must be greater than zero".to_string(),
        });
    }
    Ok(interval)
}

/// Polls one feed per tick, always the one fetched longest ago.
pub struct Scheduler {
    db: Arc<Database>,
    source: Arc<dyn FeedSource>,
    interval: Duration,
    out: Output,
}

impl Scheduler {
    pub fn new(db: Arc<Database>, source: Arc<dyn FeedSource>, interval: Duration) -> Self {
        Self {
            db,
            source,
            interval,
            out: Output::Stdout,
        }
    }

    pub fn with_output(mut self, out: Output) -> Self {
        self.out = out;
        self
    }

    /// Runs until `shutdown` is cancelled. The first tick fires immediately;
    /// errors from a tick are reported and never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.tick() => self.report(result),
            }
        }

        info!("Feed aggregation stopped");
    }

    /// Selects the next feed and processes it.
    pub async fn tick(&self) -> Result<(Feed, ParsedFeed), GatorError> {
        let feed = self
            .db
            .next_feed_to_fetch()
            .await?
            .ok_or(GatorError::NoFeedAvailable)?;

        let parsed = process_feed(&self.db, self.source.as_ref(), &feed).await?;
        Ok((feed, parsed))
    }

    fn report(&self, result: Result<(Feed, ParsedFeed), GatorError>) {
        match result {
            Ok((feed, parsed)) => {
                info!("Fetched {} items from '{}'", parsed.items.len(), feed.name);
                for line in render(&parsed) {
                    self.out.line(line);
                }
            }
            Err(GatorError::NoFeedAvailable) => {
                warn!("No feeds to fetch yet, add one with `addfeed`")
            }
            Err(e) => error!("Failed to process feed: {}", e),
        }
    }
}

/// The channel title followed by one line per item.
pub fn render(parsed: &ParsedFeed) -> Vec<String> {
    std::iter::once(parsed.title.clone())
        .chain(parsed.items.iter().map(|item| format!(" * {}", item.title)))
        .collect()
}
