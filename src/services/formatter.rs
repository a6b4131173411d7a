use crate::domain::{NormalizedEntry, NotificationPayload};
use crate::errors::FormatError;
use crate::services::normalizer::truncate;

/// Character budget for the message body
pub const DEFAULT_BODY_LIMIT: usize = 800;

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M UTC";

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    body_limit: usize,
}

impl MessageFormatter {
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }

    /// Render one entry for delivery, attributed to `source_label`
    pub fn format(
        &self,
        entry: &NormalizedEntry,
        source_label: &str,
    ) -> Result<NotificationPayload, FormatError> {
        // No escapes are allowed inside an entity, and only '*' can end a bold one
        let title = entry
            .title
            .as_deref()
            .map(|t| t.replace('*', ""))
            .filter(|t| !t.trim().is_empty())
            .ok_or(FormatError::MissingTitle)?;

        if entry.link.trim().is_empty() {
            return Err(FormatError::MissingLink);
        }

        let body = truncate(&entry.clean_content, self.body_limit);

        Ok(NotificationPayload {
            title_line: format!("*{}*", title.trim()),
            source_line: format!("📰 Via {}", escape_markdown(source_label)),
            body_text: escape_markdown(&body),
            source_link: entry.link.trim().to_string(),
            formatted_published_at: entry
                .published
                .instant()
                .map(|dt| dt.format(DATE_FORMAT).to_string()),
        })
    }
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

/// Escape the characters Telegram's legacy Markdown treats as entity markers
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Published;
    use chrono::{TimeZone, Utc};

    fn entry() -> NormalizedEntry {
        NormalizedEntry {
            title: Some("Kongreso 2024".to_string()),
            link: "https://example.com/kongreso".to_string(),
            published: Published::At(Utc.with_ymd_and_hms(2024, 1, 15, 12, 5, 0).unwrap()),
            clean_content: "La kongreso okazos en julio.".to_string(),
        }
    }

    #[test]
    fn test_format_full_entry() {
        let payload = MessageFormatter::default().format(&entry(), "Esperanto Blogo").unwrap();

        assert_eq!(payload.title_line, "*Kongreso 2024*");
        assert_eq!(payload.source_line, "📰 Via Esperanto Blogo");
        assert_eq!(payload.body_text, "La kongreso okazos en julio.");
        assert_eq!(payload.source_link, "https://example.com/kongreso");
        assert_eq!(
            payload.formatted_published_at.as_deref(),
            Some("15/01/2024 12:05 UTC")
        );
    }

    #[test]
    fn test_body_truncated_to_budget() {
        let mut long = entry();
        long.clean_content = "a".repeat(2000);

        let payload = MessageFormatter::default().format(&long, "Blog").unwrap();
        assert_eq!(payload.body_text.chars().count(), DEFAULT_BODY_LIMIT + 3);
        assert!(payload.body_text.ends_with("..."));
    }

    #[test]
    fn test_unparsable_date_omits_date_line() {
        for published in [Published::Absent, Published::Unparsable("soon".to_string())] {
            let mut undated = entry();
            undated.published = published;

            let payload = MessageFormatter::default().format(&undated, "Blog").unwrap();
            assert!(payload.formatted_published_at.is_none());
            assert!(!payload.render().contains("📅"));
        }
    }

    #[test]
    fn test_missing_title_is_format_error() {
        let mut untitled = entry();
        untitled.title = Some("   ".to_string());

        assert_eq!(
            MessageFormatter::default().format(&untitled, "Blog"),
            Err(FormatError::MissingTitle)
        );
    }

    #[test]
    fn test_missing_link_is_format_error() {
        let mut unlinked = entry();
        unlinked.link = String::new();

        assert_eq!(
            MessageFormatter::default().format(&unlinked, "Blog"),
            Err(FormatError::MissingLink)
        );
    }

    #[test]
    fn test_markdown_markers_escaped() {
        let mut noisy = entry();
        noisy.title = Some("snake_case *and* [links]".to_string());
        noisy.clean_content = "use `code`".to_string();

        let payload = MessageFormatter::default().format(&noisy, "my_blog").unwrap();
        assert_eq!(payload.title_line, "*snake_case and [links]*");
        assert_eq!(payload.body_text, "use \\`code\\`");
        assert_eq!(payload.source_line, "📰 Via my\\_blog");
    }

    #[test]
    fn test_title_of_only_asterisks_is_missing() {
        let mut starred = entry();
        starred.title = Some(" *** ".to_string());

        assert!(matches!(
            MessageFormatter::default().format(&starred, "Blog"),
            Err(FormatError::MissingTitle)
        ));
    }
}
