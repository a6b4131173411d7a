use chrono::{DateTime, Utc};

use crate::domain::Feed;
use crate::errors::{FeederResult, PersistenceError};

#[cfg_attr(test, mockall::automock)]
pub trait FeedRepository: Send + Sync {
    fn add(&self, feed: &Feed) -> FeederResult<i64>;
    fn remove(&self, id: i64) -> FeederResult<()>;
    /// All feeds in insertion order
    fn get_all(&self) -> FeederResult<Vec<Feed>>;
    fn get_by_name(&self, name: &str) -> FeederResult<Option<Feed>>;
    fn exists(&self, name: &str, url: &str) -> FeederResult<bool>;
}

/// Watermark and seen-link persistence. `None`/empty loads mean first run.
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, PersistenceError>;
    /// Oldest first
    fn load_seen_links(&self) -> Result<Vec<String>, PersistenceError>;
    /// Replace both records together, or neither
    fn save_state(
        &self,
        watermark: DateTime<Utc>,
        links: &[String],
    ) -> Result<(), PersistenceError>;
}
