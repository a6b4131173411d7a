use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeederError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Feed errors
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Feed validation failed: {0}")]
    FeedValidation(String),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed already exists: {0}")]
    FeedAlreadyExists(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // User input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Errors from the telegram library
    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Scheduler is not running")]
    SchedulerStopped,

    #[error("Poll cycle aborted: {0}")]
    CycleAborted(String),
}

impl From<telegram::TelegramError> for FeederError {
    fn from(err: telegram::TelegramError) -> Self {
        FeederError::Telegram(err.to_string())
    }
}

pub type FeederResult<T> = Result<T, FeederError>;

/// Failure to obtain entries for one feed. Isolated to that feed for the cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Feed parsing failed: {0}")]
    Parse(String),

    #[error("Fetch worker panicked")]
    WorkerPanicked,
}

/// An entry that cannot be rendered. The entry is dropped for this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("entry has no title")]
    MissingTitle,

    #[error("entry has no link")]
    MissingLink,
}

/// Outcome of a failed send attempt, classified for the retry loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("rate limited by transport")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("delivery rejected: {0}")]
    Fatal(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Fatal(_))
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("state store unavailable: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt persisted state: {0}")]
    Corrupt(String),
}
