use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use feed_rs::parser;
use reqwest::blocking::Client;
use tracing::debug;

use crate::domain::RawEntry;
use crate::errors::FetchError;
use crate::sources::traits::FeedSource;

/// Entries read from the head of each feed per cycle
pub const DEFAULT_FETCH_LIMIT: usize = 5;

const USER_AGENT: &str = concat!("feedbot/", env!("CARGO_PKG_VERSION"));

/// Handed to feed-rs for dates it cannot read, so they survive as "present but unparsable"
const UNPARSABLE_DATE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Stands in for the original text of a date feed-rs could not read
pub const UNPARSABLE_DATE_TEXT: &str = "unparsable";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d %b %Y %H:%M:%S"];

pub struct RssAtomSource {
    client: Client,
    limit: usize,
}

impl RssAtomSource {
    pub fn new(limit: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            limit,
        }
    }

    fn fetch_and_parse(&self, url: &str) -> Result<feed_rs::model::Feed, FetchError> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes()?;

        Self::parse_bytes(&bytes)
    }

    fn parse_bytes(bytes: &[u8]) -> Result<feed_rs::model::Feed, FetchError> {
        parser::Builder::new()
            .timestamp_parser(parse_timestamp)
            .build()
            .parse(bytes)
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// Take the first `limit` entries and map them, dropping those without a link or date
    fn entries_from_feed(parsed: feed_rs::model::Feed, limit: usize) -> Vec<RawEntry> {
        parsed
            .entries
            .into_iter()
            .take(limit)
            .filter_map(|entry| {
                let link = Self::entry_link(&entry);
                if link.is_none() {
                    debug!(id = %entry.id, "skipping entry without link");
                    return None;
                }

                let readable = [entry.published, entry.updated]
                    .into_iter()
                    .flatten()
                    .find(|dt| *dt != UNPARSABLE_DATE);
                let published = match readable.or(entry.published).or(entry.updated) {
                    Some(dt) if dt == UNPARSABLE_DATE => UNPARSABLE_DATE_TEXT.to_string(),
                    Some(dt) => dt.to_rfc3339(),
                    None => {
                        debug!(id = %entry.id, "skipping entry without date");
                        return None;
                    }
                };

                Some(RawEntry {
                    title: entry.title.map(|t| t.content),
                    link,
                    published: Some(published),
                    content: entry.content.and_then(|c| c.body),
                    summary: entry.summary.map(|s| s.content),
                })
            })
            .collect()
    }

    /// The entry's public page: the `alternate` link, else the first link
    fn entry_link(entry: &feed_rs::model::Entry) -> Option<String> {
        entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.trim().to_string())
            .filter(|href| !href.is_empty())
    }

    /// Parse entries from raw feed bytes (used for testing)
    #[cfg(test)]
    fn entries_from_bytes(bytes: &[u8], limit: usize) -> Result<Vec<RawEntry>, FetchError> {
        Ok(Self::entries_from_feed(Self::parse_bytes(bytes)?, limit))
    }
}

/// RFC 3339, RFC 2822 and a few common naive layouts (read as UTC).
/// Any other non-blank text maps to [`UNPARSABLE_DATE`] instead of being dropped.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc())
        });

    Some(parsed.unwrap_or(UNPARSABLE_DATE))
}

impl Default for RssAtomSource {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_LIMIT)
    }
}

impl FeedSource for RssAtomSource {
    fn fetch(&self, url: &str) -> Result<Vec<RawEntry>, FetchError> {
        let parsed = self.fetch_and_parse(url)?;
        Ok(Self::entries_from_feed(parsed, self.limit))
    }

    fn validate(&self, url: &str) -> Result<String, FetchError> {
        let parsed = self.fetch_and_parse(url)?;

        Ok(parsed
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled Feed".to_string()))
    }
}
