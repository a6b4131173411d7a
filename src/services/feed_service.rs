use tracing::info;
use url::Url;

use crate::domain::Feed;
use crate::errors::{FeederError, FeederResult};
use crate::sources::FeedSource;
use crate::storage::traits::FeedRepository;

pub struct FeedService<R: FeedRepository, S: FeedSource> {
    repository: R,
    source: S,
}

impl<R: FeedRepository, S: FeedSource> FeedService<R, S> {
    pub fn new(repository: R, source: S) -> Self {
        Self { repository, source }
    }

    /// Register a feed under `name`, the label used in notifications.
    /// With `validate`, the feed is fetched once and must parse.
    pub fn add(&self, name: &str, url: &str, validate: bool) -> FeederResult<Feed> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FeederError::InvalidInput("Feed name cannot be empty".to_string()));
        }

        let url = parse_feed_url(url)?;

        if self.repository.exists(name, &url)? {
            return Err(FeederError::FeedAlreadyExists(name.to_string()));
        }

        if validate {
            let title = self
                .source
                .validate(&url)
                .map_err(|e| FeederError::FeedValidation(format!("{}: {}", url, e)))?;
            info!(feed = %name, %url, %title, "feed validated");
        }

        let feed = Feed::new(name.to_string(), url);
        let id = self.repository.add(&feed)?;

        Ok(Feed {
            id: Some(id),
            ..feed
        })
    }

    pub fn remove_by_name(&self, name: &str) -> FeederResult<Feed> {
        let feed = self
            .repository
            .get_by_name(name.trim())?
            .ok_or_else(|| FeederError::FeedNotFound(name.to_string()))?;
        let id = feed
            .id
            .ok_or_else(|| FeederError::FeedNotFound(name.to_string()))?;

        self.repository.remove(id)?;
        Ok(feed)
    }

    /// All feeds in polling order
    pub fn list(&self) -> FeederResult<Vec<Feed>> {
        self.repository.get_all()
    }
}

/// Only absolute http(s) URLs can be polled
fn parse_feed_url(raw: &str) -> FeederResult<String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| FeederError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(FeederError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            raw, other
        ))),
    }
}
