use serde::Serialize;

/// A fully rendered, delivery-ready message for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title_line: String,
    pub source_line: String,
    pub body_text: String,
    pub source_link: String,
    pub formatted_published_at: Option<String>,
}

impl NotificationPayload {
    /// Telegram Markdown text, blocks separated by blank lines
    pub fn render(&self) -> String {
        let mut message = format!("{}\n{}\n\n", self.title_line, self.source_line);

        if !self.body_text.is_empty() {
            message.push_str(&self.body_text);
            message.push_str("\n\n");
        }

        message.push_str(&format!("[Read more →]({})", self.source_link));

        if let Some(date) = &self.formatted_published_at {
            message.push_str("\n\n📅 ");
            message.push_str(date);
        }

        message
    }
}
