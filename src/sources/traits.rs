use crate::domain::RawEntry;
use crate::errors::FetchError;

#[cfg_attr(test, mockall::automock)]
pub trait FeedSource: Send + Sync {
    /// Fetch the most recent entries of one feed, in document order
    fn fetch(&self, url: &str) -> Result<Vec<RawEntry>, FetchError>;

    /// Fetch once and return the feed's own title
    fn validate(&self, url: &str) -> Result<String, FetchError>;
}
