use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry as read from a feed document, before any cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Publication time as supplied by the adapter (RFC 3339 or RFC 2822)
    pub published: Option<String>,
    /// Full body; takes precedence over `summary`
    pub content: Option<String>,
    pub summary: Option<String>,
}

impl RawEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            link: Some(link.into()),
            ..Default::default()
        }
    }

    pub fn with_published(mut self, published: Option<String>) -> Self {
        self.published = published;
        self
    }

    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content;
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    /// The markup to render: content if present and non-blank, else summary
    pub fn body(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(self.summary.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Absent,
    Unparsable(String),
    At(DateTime<Utc>),
}

impl Published {
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Published::Absent,
            Some(raw) => raw,
        };

        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .map(|dt| Published::At(dt.with_timezone(&Utc)))
            .unwrap_or_else(|_| Published::Unparsable(raw.to_string()))
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Published::At(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// An entry ready for filtering and formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub title: Option<String>,
    pub link: String,
    pub published: Published,
    pub clean_content: String,
}
